//! Shared fixtures for unit and router tests.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{hash_password, LogNotifier, SessionManager};
use crate::config::{Config, DatabaseConfig};
use crate::db::{init, init_memory, timestamp, DbPool};
use crate::AppState;

/// Insert an active user and return its id
pub async fn insert_user(db: &DbPool, email: &str, password: &str) -> i64 {
    let now = timestamp(Utc::now());
    sqlx::query_scalar(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, created_at, updated_at)
        VALUES (?, ?, 'Test', 'User', ?, ?)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(hash_password(password).expect("hash password"))
    .bind(&now)
    .bind(&now)
    .fetch_one(db)
    .await
    .expect("insert user")
}

pub async fn insert_bath(db: &DbPool, name: &str, price_per_hour: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO baths (name, address, price_per_hour, created_at) VALUES (?, 'Test St', ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(price_per_hour)
    .bind(timestamp(Utc::now()))
    .fetch_one(db)
    .await
    .expect("insert bath")
}

pub async fn insert_master(db: &DbPool, name: &str, price_per_hour: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO masters (name, specialization, price_per_hour, created_at) VALUES (?, 'Parenie', ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(price_per_hour)
    .bind(timestamp(Utc::now()))
    .fetch_one(db)
    .await
    .expect("insert master")
}

/// A pool over a SQLite file in a fresh temp dir, for tests that need
/// real concurrent connections. Keep the dir alive for the test's duration.
pub async fn file_db() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = DatabaseConfig {
        url: format!("sqlite:{}?mode=rwc", dir.path().join("spa-portal.db").display()),
        max_connections: 8,
        ..DatabaseConfig::default()
    };
    let db = init(&config).await.expect("file database");
    (dir, db)
}

/// Application state over a fresh in-memory database
pub async fn test_state() -> Arc<AppState> {
    let db = init_memory().await.expect("memory database");
    Arc::new(AppState::new(Config::default(), db, Arc::new(LogNotifier)))
}

/// Create a user with a live session, returning `(user_id, access_token)`
pub async fn login_user(state: &AppState, email: &str) -> (i64, String) {
    let user_id = insert_user(&state.db, email, "secret1").await;
    let sessions = SessionManager::new(state.db.clone(), &state.config.auth);
    let issued = sessions.create_session(user_id).await.expect("create session");
    (user_id, issued.access_token)
}
