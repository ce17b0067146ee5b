pub mod api;
pub mod auth;
pub mod booking;
pub mod cli;
pub mod config;
pub mod db;
pub mod function;
pub mod reviews;

#[cfg(test)]
pub mod test_utils;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::auth::{PasswordResets, RateLimiter, ResetNotifier, SessionManager};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: SessionManager,
    pub rate_limiter: RateLimiter,
    pub resets: PasswordResets,
    /// Delivers password reset links to users
    pub notifier: Arc<dyn ResetNotifier>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, notifier: Arc<dyn ResetNotifier>) -> Self {
        let sessions = SessionManager::new(db.clone(), &config.auth);
        let rate_limiter = RateLimiter::new(db.clone(), config.rate_limit.enabled);
        let resets = PasswordResets::new(
            db.clone(),
            sessions.clone(),
            config.auth.reset_token_ttl_minutes,
        );
        Self {
            config,
            db,
            sessions,
            rate_limiter,
            resets,
            notifier,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
