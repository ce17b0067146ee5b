//! Persisted attempt counters for the auth rate limiter.

use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RateLimitRecord {
    pub identifier: String,
    pub action: String,
    pub attempts: i64,
    pub first_attempt: String,
    pub last_attempt: String,
    pub blocked_until: Option<String>,
}
