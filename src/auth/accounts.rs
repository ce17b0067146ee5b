//! User registration and credential checks.

use chrono::Utc;
use tracing::info;

use super::{hash_password, verify_password, AuthError};
use crate::db::{timestamp, DbPool, User};

/// Normalized registration input
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Emails are compared case-insensitively and stored lowercase
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_active_by_email(db: &DbPool, email: &str) -> Result<Option<User>, AuthError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND is_active = 1")
        .bind(normalize_email(email))
        .fetch_optional(db)
        .await?;
    Ok(user)
}

/// Create a user account; fails with `EmailTaken` for a known email
pub async fn register(db: &DbPool, new_user: NewUser) -> Result<User, AuthError> {
    let email = normalize_email(&new_user.email);

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let password_hash = hash_password(&new_user.password)?;
    let now = timestamp(Utc::now());

    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, phone, first_name, last_name, role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'user', 1, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(&new_user.phone)
    .bind(new_user.first_name.trim())
    .bind(new_user.last_name.trim())
    .bind(&now)
    .bind(&now)
    .fetch_one(db)
    .await;

    let user = match inserted {
        Ok(user) => user,
        // Lost a race with a concurrent registration of the same email
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE constraint failed") => {
            return Err(AuthError::EmailTaken);
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, "Registered new user");
    Ok(user)
}

/// Check an email/password pair against active accounts
pub async fn verify_credentials(db: &DbPool, email: &str, password: &str) -> Result<User, AuthError> {
    let user = find_active_by_email(db, email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(user)
}

/// Replace a user's password hash
pub async fn set_password(
    conn: &mut sqlx::SqliteConnection,
    user_id: i64,
    new_password: &str,
) -> Result<(), AuthError> {
    let password_hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(timestamp(Utc::now()))
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "steam-and-birch".to_string(),
            first_name: "Olga".to_string(),
            last_name: "Ivanova".to_string(),
            phone: Some("+7 900 123 45 67".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let db = init_memory().await.unwrap();
        let user = register(&db, new_user("  Olga@Example.com ")).await.unwrap();
        assert_eq!(user.email, "olga@example.com");
        assert_eq!(user.role, "user");
        assert!(user.is_active);
        assert_ne!(user.password_hash, "steam-and-birch");

        let logged_in = verify_credentials(&db, "OLGA@example.com", "steam-and-birch")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let db = init_memory().await.unwrap();
        register(&db, new_user("olga@example.com")).await.unwrap();
        assert!(matches!(
            register(&db, new_user("OLGA@example.com")).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_and_inactive_user() {
        let db = init_memory().await.unwrap();
        let user = register(&db, new_user("olga@example.com")).await.unwrap();

        assert!(matches!(
            verify_credentials(&db, "olga@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(user.id)
            .execute(&db)
            .await
            .unwrap();
        assert!(matches!(
            verify_credentials(&db, "olga@example.com", "steam-and-birch").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
