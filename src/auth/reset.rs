//! Password reset tokens and delivery of reset links.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::session::{generate_token, hash_token};
use super::{accounts, AuthError, SessionManager};
use crate::db::{begin_immediate, timestamp, DbPool};

const RESET_TOKEN_BYTES: usize = 32;

/// Delivers reset links to users
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> anyhow::Result<()>;
}

/// Writes reset links to the log instead of sending mail
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> anyhow::Result<()> {
        info!(email, reset_url, "Password reset requested");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PasswordResets {
    db: DbPool,
    sessions: SessionManager,
    ttl: Duration,
}

impl PasswordResets {
    pub fn new(db: DbPool, sessions: SessionManager, ttl_minutes: i64) -> Self {
        Self {
            db,
            sessions,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issue a reset token for an active account.
    ///
    /// Returns `None` for unknown or inactive emails; callers answer the
    /// same way in both cases.
    pub async fn request_reset(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        let Some(user) = accounts::find_active_by_email(&self.db, email).await? else {
            return Ok(None);
        };

        let token = generate_token(RESET_TOKEN_BYTES);
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(timestamp(now + self.ttl))
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;

        Ok(Some(token))
    }

    /// Set a new password with an unused, unexpired token.
    ///
    /// The token is consumed and all of the user's sessions are revoked.
    pub async fn confirm_reset(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tx = begin_immediate(&self.db).await?;

        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, user_id FROM password_reset_tokens
            WHERE token_hash = ? AND expires_at > ? AND used_at IS NULL
            "#,
        )
        .bind(hash_token(token))
        .bind(timestamp(now))
        .fetch_optional(&mut *tx)
        .await?;

        let (token_id, user_id) = row.ok_or(AuthError::InvalidResetToken)?;

        accounts::set_password(&mut *tx, user_id, new_password).await?;

        sqlx::query("UPDATE password_reset_tokens SET used_at = ? WHERE id = ?")
            .bind(timestamp(now))
            .bind(token_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.sessions.revoke_all(user_id).await?;
        info!(user_id, "Password reset completed");
        Ok(user_id)
    }

    /// Delete tokens that can no longer be redeemed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE expires_at <= ? OR used_at IS NOT NULL",
        )
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKind;
    use crate::config::AuthConfig;
    use crate::db::init_memory;

    async fn setup() -> (DbPool, SessionManager, PasswordResets, i64) {
        let db = init_memory().await.unwrap();
        let user_id = crate::test_utils::insert_user(&db, "guest@example.com", "secret1").await;
        let sessions = SessionManager::new(db.clone(), &AuthConfig::default());
        let resets = PasswordResets::new(db.clone(), sessions.clone(), 60);
        (db, sessions, resets, user_id)
    }

    #[tokio::test]
    async fn test_unknown_email_gets_no_token() {
        let (_db, _sessions, resets, _user_id) = setup().await;
        assert!(resets
            .request_reset("nobody@example.com", Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_confirm_changes_password_and_revokes_sessions() {
        let (db, sessions, resets, user_id) = setup().await;
        let issued = sessions.create_session(user_id).await.unwrap();
        let now = Utc::now();

        let token = resets
            .request_reset("Guest@Example.com", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resets.confirm_reset(&token, "new-secret", now).await.unwrap(), user_id);

        assert!(accounts::verify_credentials(&db, "guest@example.com", "new-secret")
            .await
            .is_ok());
        assert!(accounts::verify_credentials(&db, "guest@example.com", "secret1")
            .await
            .is_err());
        assert!(sessions.authenticate(&issued.access_token).await.is_err());
        assert!(!sessions.revoke(&issued.refresh_token, TokenKind::Refresh).await.unwrap());

        // Tokens are single use
        assert!(matches!(
            resets.confirm_reset(&token, "another-one", now).await,
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_spent_and_expired_tokens() {
        let (db, _sessions, resets, _user_id) = setup().await;
        let now = Utc::now();

        let used = resets.request_reset("guest@example.com", now).await.unwrap().unwrap();
        resets.confirm_reset(&used, "new-secret", now).await.unwrap();
        resets
            .request_reset("guest@example.com", now - Duration::minutes(90))
            .await
            .unwrap();
        let live = resets.request_reset("guest@example.com", now).await.unwrap().unwrap();

        assert_eq!(resets.purge_expired(now).await.unwrap(), 2);
        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM password_reset_tokens")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(left, 1);
        assert!(resets.confirm_reset(&live, "newer-secret", now).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let (_db, _sessions, resets, _user_id) = setup().await;
        let now = Utc::now();
        let token = resets.request_reset("guest@example.com", now).await.unwrap().unwrap();

        assert!(matches!(
            resets
                .confirm_reset(&token, "new-secret", now + Duration::minutes(61))
                .await,
            Err(AuthError::InvalidResetToken)
        ));
        assert!(matches!(
            resets.confirm_reset("made-up", "new-secret", now).await,
            Err(AuthError::InvalidResetToken)
        ));
    }
}
