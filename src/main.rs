use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spa_portal::auth::LogNotifier;
use spa_portal::cli::{self, Cli};
use spa_portal::config::Config;
use spa_portal::AppState;

/// How often expired sessions, reset tokens and idle rate limit counters are swept
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !cli.is_serve() {
        return cli::run_command(&cli, config).await;
    }

    tracing::info!("Starting spa-portal v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    cli::prepare_data_dir(&config)?;

    // Initialize database
    let db = spa_portal::db::init(&config.database).await?;

    let metrics_handle = spa_portal::api::metrics::init_metrics()?;

    let state = Arc::new(
        AppState::new(config.clone(), db, Arc::new(LogNotifier)).with_metrics(metrics_handle),
    );

    tokio::spawn(purge_loop(state.clone()));

    let app = spa_portal::api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drop rows that can no longer affect any request
async fn purge_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        let now = Utc::now();

        // Sessions whose access and refresh tokens have both expired
        match state.sessions.purge_expired(now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Purged expired sessions"),
            Err(e) => tracing::warn!(error = %e, "Session purge failed"),
        }

        match state.resets.purge_expired(now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Purged spent reset tokens"),
            Err(e) => tracing::warn!(error = %e, "Reset token purge failed"),
        }

        let max_window = state.config.rate_limit.max_window_minutes();
        match state.rate_limiter.purge_stale(now, max_window).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "Purged idle rate limit counters"),
            Err(e) => tracing::warn!(error = %e, "Rate limit purge failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
