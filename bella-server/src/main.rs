//! bella-server - Social media content calendar service
//!
//! Serves the generator form pages and the JSON generation API, and runs the
//! queue worker for large batch requests.

use anyhow::{Context, Result};
use bella_common::config::{prepare_root_folder, resolve_root_folder, TomlConfig};
use bella_common::db::init_database;
use bella_server::governor::MemoryMonitor;
use bella_server::{build_router, logging, start_background_tasks, AppState, Providers};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "bella-server", version, about = "Content calendar generation service")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "BELLA_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(long)]
    root_folder: Option<String>,

    /// Port to listen on, overriding the config file
    #[arg(long, env = "BELLA_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = logging::init();

    info!(
        "Starting B.E.L.L.A. content service (bella-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Err(e) = log_level.apply_config(&config.logging) {
        warn!("Failed to apply configured log level: {}", e);
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = prepare_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let providers = Providers::from_config(&config);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(pool, config, providers, MemoryMonitor::system());
    let tasks = start_background_tasks(&state);
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("bella-server listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Serve may also end without a signal; make sure the workers stop
    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!("Background task failed: {}", e);
        }
    }

    info!("bella-server stopped");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling background work
async fn shutdown_signal(token: tokio_util::sync::CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    token.cancel();
}
