//! Accounts, sessions and attempt limiting.

pub mod accounts;
pub mod password;
pub mod rate_limit;
pub mod reset;
pub mod session;

pub use password::{hash_password, verify_password};
pub use rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter};
pub use reset::{LogNotifier, PasswordResets, ResetNotifier};
pub use session::{IssuedSession, RefreshedToken, SessionManager, TokenKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, unknown or expired access token, or a deactivated user
    #[error("authentication required")]
    Unauthenticated,
    /// Missing or expired refresh token
    #[error("invalid refresh token")]
    InvalidToken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email is already registered")]
    EmailTaken,
    #[error("invalid or expired reset token")]
    InvalidResetToken,
    #[error("too many attempts, retry in {wait_minutes} min")]
    RateLimited { wait_minutes: i64 },
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::Hash(err.to_string())
    }
}
