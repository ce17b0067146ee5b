//! Access/refresh token pairs backed by the `sessions` table.
//!
//! Raw tokens are handed to the client exactly once; only their SHA-256
//! digests are persisted. A session moves `issued → active → expired` on
//! its own once `expires_at` passes, or to `revoked` when its row is
//! deleted.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::AuthError;
use crate::config::AuthConfig;
use crate::db::{timestamp, DbPool, User};

const ACCESS_TOKEN_BYTES: usize = 32;
const REFRESH_TOKEN_BYTES: usize = 48;

/// Generate a random hex token of `len` bytes of entropy
pub fn generate_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Which half of a token pair is being presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Freshly issued token pair; the raw values cannot be recovered later
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionManager {
    db: DbPool,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(db: DbPool, config: &AuthConfig) -> Self {
        Self {
            db,
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Access token lifetime, reported to clients as `expires_in`
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub async fn create_session(&self, user_id: i64) -> Result<IssuedSession, AuthError> {
        self.create_session_at(user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let access_token = generate_token(ACCESS_TOKEN_BYTES);
        let refresh_token = generate_token(REFRESH_TOKEN_BYTES);
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let session_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, refresh_token_hash, expires_at, refresh_expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(hash_token(&access_token))
        .bind(hash_token(&refresh_token))
        .bind(timestamp(access_expires_at))
        .bind(timestamp(refresh_expires_at))
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;

        debug!(user_id, session_id = %session_id, "Session created");

        Ok(IssuedSession {
            session_id,
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Resolve an access token to its active user
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        self.authenticate_at(access_token, Utc::now()).await
    }

    pub async fn authenticate_at(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        if access_token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT u.* FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(hash_token(access_token))
        .bind(timestamp(now))
        .fetch_optional(&self.db)
        .await?;

        match user {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::Unauthenticated),
        }
    }

    /// Issue a new access token for a live refresh token.
    ///
    /// The refresh token itself is left untouched and stays valid until its
    /// own expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, AuthError> {
        self.refresh_at(refresh_token, Utc::now()).await
    }

    pub async fn refresh_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshedToken, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let refresh_hash = hash_token(refresh_token);
        let session_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT s.id FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.refresh_token_hash = ? AND s.refresh_expires_at > ? AND u.is_active = 1
            "#,
        )
        .bind(&refresh_hash)
        .bind(timestamp(now))
        .fetch_optional(&self.db)
        .await?;

        let session_id = session_id.ok_or(AuthError::InvalidToken)?;

        let access_token = generate_token(ACCESS_TOKEN_BYTES);
        let expires_at = now + self.access_ttl;

        sqlx::query("UPDATE sessions SET token_hash = ?, expires_at = ? WHERE id = ?")
            .bind(hash_token(&access_token))
            .bind(timestamp(expires_at))
            .bind(&session_id)
            .execute(&self.db)
            .await?;

        debug!(session_id = %session_id, "Access token refreshed");

        Ok(RefreshedToken {
            access_token,
            expires_at,
        })
    }

    /// Delete the session owning `token`.
    ///
    /// Returns `false` when no session matched, so a repeated logout is not
    /// an error.
    pub async fn revoke(&self, token: &str, kind: TokenKind) -> Result<bool, AuthError> {
        let sql = match kind {
            TokenKind::Access => "DELETE FROM sessions WHERE token_hash = ?",
            TokenKind::Refresh => "DELETE FROM sessions WHERE refresh_token_hash = ?",
        };

        let result = sqlx::query(sql)
            .bind(hash_token(token))
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop every session of a user
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() > 0 {
            info!(user_id, count = result.rows_affected(), "Revoked all sessions");
        }
        Ok(result.rows_affected())
    }

    /// Remove sessions whose refresh token has also expired
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= ?1 AND (refresh_expires_at IS NULL OR refresh_expires_at <= ?1)
            "#,
        )
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
