use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that overrides `database.url`
pub const DATABASE_URL_ENV: &str = "SPA_PORTAL_DATABASE_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for handling a single request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Base URL of the web client, used to build password reset links
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            site_url: default_site_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_site_url() -> String {
    "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g. `sqlite:./data/spa-portal.db?mode=rwc`)
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long to wait for a pooled connection before failing
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// How long SQLite waits on a locked database before returning SQLITE_BUSY
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
    /// Insert a small demo catalog of baths and masters on startup
    #[serde(default)]
    pub seed_demo_catalog: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            busy_timeout_secs: default_busy_timeout(),
            seed_demo_catalog: false,
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/spa-portal.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of an access token in minutes
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,
    /// Lifetime of a refresh token in days
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: i64,
    /// Lifetime of a password reset token in minutes
    #[serde(default = "default_reset_ttl")]
    pub reset_token_ttl_minutes: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_minutes: default_access_ttl(),
            refresh_token_ttl_days: default_refresh_ttl(),
            reset_token_ttl_minutes: default_reset_ttl(),
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_access_ttl() -> i64 {
    60
}

fn default_refresh_ttl() -> i64 {
    30
}

fn default_reset_ttl() -> i64 {
    60
}

fn default_min_password_length() -> usize {
    6
}

/// Attempt budget for one action
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window_minutes: i64,
}

impl RateLimitPolicy {
    pub const fn new(max_attempts: u32, window_minutes: i64) -> Self {
        Self {
            max_attempts,
            window_minutes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_login_policy")]
    pub login: RateLimitPolicy,
    #[serde(default = "default_register_policy")]
    pub register: RateLimitPolicy,
    #[serde(default = "default_reset_policy")]
    pub reset_password: RateLimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            login: default_login_policy(),
            register: default_register_policy(),
            reset_password: default_reset_policy(),
        }
    }
}

impl RateLimitConfig {
    /// Longest window across all policies
    pub fn max_window_minutes(&self) -> i64 {
        [self.login, self.register, self.reset_password]
            .iter()
            .map(|policy| policy.window_minutes)
            .max()
            .unwrap_or(0)
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_login_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(5, 15)
}

fn default_register_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(3, 60)
}

fn default_reset_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(3, 60)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.database.url = url;
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Directory holding the SQLite file, if the URL points at one
    pub fn data_dir(&self) -> Option<PathBuf> {
        let rest = self.database.url.strip_prefix("sqlite:")?;
        let rest = rest.trim_start_matches("//");
        let path = rest.split('?').next()?;
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Path::new(path).parent().map(Path::to_path_buf)
    }
}
