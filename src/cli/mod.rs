//! Command-line interface for spa-portal.
//!
//! Subcommands:
//! - `serve` - Run the HTTP server (the default)
//! - `invoke` - Run one invocation event through a function and print the response
//! - `config check` - Validate configuration file
//! - `db seed` - Insert the demo catalog of baths and masters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::auth::LogNotifier;
use crate::config::Config;
use crate::function::{self, InvocationEvent, FUNCTIONS};
use crate::AppState;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "spa-portal")]
#[command(author, version, about = "Booking and session backend for a bathhouse portal", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SPA_PORTAL_CONFIG", default_value = "spa-portal.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve,

    /// Run a single invocation event and print the JSON response
    Invoke {
        /// Function to call: auth, bookings, availability or reviews
        #[arg(short, long)]
        function: String,
        /// Event file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: PathBuf,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Apply migrations and insert the demo catalog
    Seed,
}

impl Cli {
    /// True when the server should start
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }
}

/// Run a non-server subcommand
pub async fn run_command(cli: &Cli, config: Config) -> Result<()> {
    match &cli.command {
        None | Some(Commands::Serve) => {
            anyhow::bail!("`serve` is handled by the server entry point")
        }
        Some(Commands::Invoke { function, event }) => cmd_invoke(config, function, event).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        Some(Commands::Db(DbCommands::Seed)) => cmd_db_seed(config).await,
    }
}

async fn cmd_invoke(config: Config, function: &str, event_path: &Path) -> Result<()> {
    if !FUNCTIONS.contains(&function) {
        anyhow::bail!(
            "Unknown function '{}', expected one of: {}",
            function,
            FUNCTIONS.join(", ")
        );
    }

    let raw = read_event(event_path).await?;
    let event: InvocationEvent =
        serde_json::from_str(&raw).context("Failed to parse invocation event")?;

    prepare_data_dir(&config)?;
    let db = crate::db::init(&config.database).await?;
    let state = Arc::new(AppState::new(config, db, Arc::new(LogNotifier)));
    let router = crate::api::create_router(state);

    let response = function::invoke(router, function, event).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn read_event(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read event from stdin")?;
        Ok(raw)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file: {}", path.display()))
    }
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("To create a custom configuration, copy spa-portal.example.toml to spa-portal.toml");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Address:      {}:{}", config.server.host, config.server.port);
            println!("  Timeout:      {}s", config.server.request_timeout_secs);
            println!("  Site URL:     {}", config.server.site_url);
            println!();
            println!("Database:");
            println!("  URL:          {}", config.database.url);
            println!("  Connections:  {}", config.database.max_connections);
            println!(
                "  Demo Catalog: {}",
                if config.database.seed_demo_catalog {
                    "Enabled"
                } else {
                    "Disabled"
                }
            );
            println!();
            println!("Auth:");
            println!("  Access TTL:   {} min", config.auth.access_token_ttl_minutes);
            println!("  Refresh TTL:  {} days", config.auth.refresh_token_ttl_days);
            println!("  Reset TTL:    {} min", config.auth.reset_token_ttl_minutes);
            println!(
                "  Rate Limiting: {}",
                if config.rate_limit.enabled {
                    "Enabled"
                } else {
                    "Disabled"
                }
            );
            println!();

            let warnings = config_warnings(&config);
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

fn config_warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.rate_limit.enabled {
        warnings.push("Rate limiting is disabled - auth endpoints accept unlimited attempts".to_string());
    }
    if config.auth.min_password_length < 6 {
        warnings.push(format!(
            "Minimum password length is {}, below the recommended 6",
            config.auth.min_password_length
        ));
    }
    if config.auth.access_token_ttl_minutes <= 0 || config.auth.refresh_token_ttl_days <= 0 {
        warnings.push("Token lifetimes must be positive".to_string());
    }
    for (name, policy) in [
        ("login", config.rate_limit.login),
        ("register", config.rate_limit.register),
        ("reset_password", config.rate_limit.reset_password),
    ] {
        if policy.max_attempts == 0 || policy.window_minutes <= 0 {
            warnings.push(format!("Rate limit policy '{}' blocks every attempt", name));
        }
    }

    warnings
}

async fn cmd_db_seed(config: Config) -> Result<()> {
    prepare_data_dir(&config)?;
    let db = crate::db::init(&config.database).await?;
    crate::db::seed_demo_catalog(&db).await?;
    println!("[OK] Demo catalog seeded into {}", config.database.url);
    Ok(())
}

/// Create the directory holding the SQLite file
pub fn prepare_data_dir(config: &Config) -> Result<()> {
    if let Some(dir) = config.data_dir() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        }
    }
    Ok(())
}
