//! Fixed-window attempt limiting for auth actions.
//!
//! Counters live in the `rate_limits` table keyed by `(identifier, action)`,
//! so every process sharing the database sees the same budget. Going over
//! the budget locks the identifier out for one full window.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::AuthError;
use crate::config::RateLimitPolicy;
use crate::db::{begin_immediate, parse_timestamp, timestamp, DbPool, RateLimitRecord};

/// Actions with their own attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Login,
    Register,
    ResetPassword,
}

impl RateLimitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitAction::Login => "login",
            RateLimitAction::Register => "register",
            RateLimitAction::ResetPassword => "reset-password",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Minutes until the next attempt is accepted, 0 when allowed
    pub wait_minutes: i64,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            wait_minutes: 0,
        }
    }

    fn deny(wait_minutes: i64) -> Self {
        Self {
            allowed: false,
            wait_minutes: wait_minutes.max(1),
        }
    }

    /// Turn a denial into `AuthError::RateLimited`
    pub fn into_result(self) -> Result<(), AuthError> {
        if self.allowed {
            Ok(())
        } else {
            Err(AuthError::RateLimited {
                wait_minutes: self.wait_minutes,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    db: DbPool,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(db: DbPool, enabled: bool) -> Self {
        Self { db, enabled }
    }

    /// Record one attempt and decide whether it may proceed
    pub async fn check(
        &self,
        identifier: &str,
        action: RateLimitAction,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitDecision, AuthError> {
        self.check_at(identifier, action, policy, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        identifier: &str,
        action: RateLimitAction,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, AuthError> {
        if !self.enabled {
            return Ok(RateLimitDecision::allow());
        }

        let window = Duration::minutes(policy.window_minutes);
        let now_ts = timestamp(now);
        let mut tx = begin_immediate(&self.db).await?;

        let record: Option<RateLimitRecord> = sqlx::query_as(
            "SELECT * FROM rate_limits WHERE identifier = ? AND action = ?",
        )
        .bind(identifier)
        .bind(action.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            sqlx::query(
                r#"
                INSERT INTO rate_limits (identifier, action, attempts, first_attempt, last_attempt)
                VALUES (?, ?, 1, ?, ?)
                ON CONFLICT (identifier, action)
                DO UPDATE SET attempts = attempts + 1, last_attempt = excluded.last_attempt
                "#,
            )
            .bind(identifier)
            .bind(action.as_str())
            .bind(&now_ts)
            .bind(&now_ts)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(RateLimitDecision::allow());
        };

        if let Some(blocked_until) = record.blocked_until.as_deref().and_then(parse_timestamp) {
            if blocked_until > now {
                let remaining = blocked_until - now;
                // Round up so a client never retries into a still-active block
                let wait = (remaining.num_seconds() + 59) / 60;
                return Ok(RateLimitDecision::deny(wait));
            }
        }

        let window_started = parse_timestamp(&record.first_attempt).unwrap_or(now);
        if now - window_started > window {
            sqlx::query(
                r#"
                UPDATE rate_limits
                SET attempts = 1, first_attempt = ?1, last_attempt = ?1, blocked_until = NULL
                WHERE identifier = ?2 AND action = ?3
                "#,
            )
            .bind(&now_ts)
            .bind(identifier)
            .bind(action.as_str())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(RateLimitDecision::allow());
        }

        let attempts = record.attempts + 1;
        if attempts > i64::from(policy.max_attempts) {
            sqlx::query(
                r#"
                UPDATE rate_limits
                SET attempts = ?, last_attempt = ?, blocked_until = ?
                WHERE identifier = ? AND action = ?
                "#,
            )
            .bind(attempts)
            .bind(&now_ts)
            .bind(timestamp(now + window))
            .bind(identifier)
            .bind(action.as_str())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            warn!(
                identifier,
                action = action.as_str(),
                attempts,
                "Rate limit exceeded, blocking"
            );
            return Ok(RateLimitDecision::deny(policy.window_minutes));
        }

        sqlx::query(
            "UPDATE rate_limits SET attempts = ?, last_attempt = ? WHERE identifier = ? AND action = ?",
        )
        .bind(attempts)
        .bind(&now_ts)
        .bind(identifier)
        .bind(action.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(RateLimitDecision::allow())
    }

    /// Drop counters idle for longer than `max_window_minutes` that carry no
    /// active block
    pub async fn purge_stale(
        &self,
        now: DateTime<Utc>,
        max_window_minutes: i64,
    ) -> Result<u64, AuthError> {
        let idle_since = timestamp(now - Duration::minutes(max_window_minutes));
        let result = sqlx::query(
            r#"
            DELETE FROM rate_limits
            WHERE last_attempt < ?1 AND (blocked_until IS NULL OR blocked_until <= ?2)
            "#,
        )
        .bind(idle_since)
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Identify the caller by forwarded address.
///
/// Takes the first entry of `X-Forwarded-For`, then `X-Real-IP`, and falls
/// back to `"unknown"` so all anonymous callers share one budget.
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}
