//! recon-id - contact identity reconciliation service
//!
//! Serves POST /identify and GET /getall over a SQLite contact store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use recon_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use recon_common::db::{init_database, DatabaseOptions};
use recon_id::identity::IdentityService;
use recon_id::store::SqliteContactStore;
use recon_id::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for recon-id
///
/// Each option overrides the TOML config file, which overrides the defaults.
#[derive(Parser, Debug)]
#[command(name = "recon-id")]
#[command(about = "Contact identity reconciliation service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/recon/config.toml, then /etc/recon/config.toml)
    #[arg(short, long, env = "RECON_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "RECON_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "RECON_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "RECON_DATABASE")]
    database: Option<PathBuf>,

    /// Maximum wait for an identity lock, in milliseconds
    #[arg(long, env = "RECON_LOCK_WAIT_MS")]
    lock_wait_ms: Option<u64>,

    /// Database pool size
    #[arg(long, env = "RECON_MAX_CONNECTIONS")]
    max_connections: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recon_id=info,recon_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting recon-id v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let file = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(
        ConfigOverrides {
            bind: args.bind,
            port: args.port,
            database_path: args.database,
            lock_wait_ms: args.lock_wait_ms,
            max_connections: args.max_connections,
        },
        file,
    )
    .context("Invalid configuration")?;

    info!("Database path: {}", config.database_path.display());
    info!("Lock wait: {} ms", config.lock_wait_ms);

    let pool = init_database(
        &config.database_path,
        &DatabaseOptions {
            max_connections: config.max_connections,
            lock_wait: config.lock_wait(),
        },
    )
    .await
    .context("Failed to initialize database")?;

    let store = Arc::new(SqliteContactStore::new(pool.clone()));
    let identity = IdentityService::new(store, config.lock_wait());
    let app = build_router(AppState::new(identity));

    let listener = tokio::net::TcpListener::bind((config.bind.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", config.bind, config.port))?;

    info!("Starting HTTP server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
