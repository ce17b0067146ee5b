mod models;
mod seeders;

pub use models::*;
pub use seeders::seed_demo_catalog;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Sqlite, SqlitePool, Transaction,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = SqlitePool;

/// Start a transaction holding SQLite's write lock from its first statement.
///
/// Required for read-then-write transactions. A deferred transaction that
/// upgrades to a writer after reading fails with `SQLITE_BUSY` instead of
/// waiting out `busy_timeout`.
pub async fn begin_immediate(pool: &DbPool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// Format a timestamp for storage.
///
/// Every timestamp column uses this exact layout so that string comparison
/// in SQL matches chronological order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp written by [`timestamp`]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split a migration file into statements.
///
/// Comment lines are dropped. Trigger bodies contain `;` between
/// `BEGIN` and `END`, so a `CREATE TRIGGER` chunk is accumulated until its
/// closing `END`.
fn split_statements(sql: &str) -> Vec<String> {
    let cleaned: String = sql
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut statements = Vec::new();
    let mut pending = String::new();

    for chunk in cleaned.split(';') {
        if !pending.is_empty() {
            pending.push(';');
        }
        pending.push_str(chunk);

        let trimmed = pending.trim();
        if trimmed.is_empty() {
            pending.clear();
            continue;
        }

        let upper = trimmed.to_uppercase();
        let in_trigger = upper.starts_with("CREATE TRIGGER") && !upper.ends_with("END");
        if !in_trigger {
            statements.push(trimmed.to_string());
            pending.clear();
        }
    }

    let rest = pending.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }

    statements
}

/// Execute a SQL migration file statement by statement
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in split_statements(sql) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn init(config: &DatabaseConfig) -> Result<DbPool> {
    info!("Initializing database at {}", config.url);

    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    if config.seed_demo_catalog {
        seeders::seed_demo_catalog(&pool).await?;
    }

    info!("Database initialized successfully");
    Ok(pool)
}

/// Fresh in-memory database with the full schema applied.
///
/// A single connection is used so every query sees the same database.
pub async fn init_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users, sessions, rate limits, password resets
    execute_sql(pool, include_str!("../../migrations/001_users.sql")).await?;

    // Migration 002: Baths and masters
    execute_sql(pool, include_str!("../../migrations/002_catalog.sql")).await?;

    // Migration 003: Bookings and the overlap guard triggers
    execute_sql(pool, include_str!("../../migrations/003_bookings.sql")).await?;

    // Migration 004: Reviews
    let has_reviews_table: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='reviews'",
    )
    .fetch_optional(pool)
    .await?;
    if has_reviews_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/004_reviews.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}
