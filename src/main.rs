//! Collider Binary Entry Point
//!
//! This binary runs the complete Collider pipeline and API server.
//! Core functionality is provided by the `collider` library crate.

use clap::Parser;
use collider::{
    config::AppConfig,
    pipeline::Pipeline,
    query::EventQueryService,
    server::{AppState, create_router},
    storage::{DuckDbStore, EventStore},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Collider - Particle Event Pipeline
#[derive(Parser, Debug)]
#[command(name = "collider", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "COLLIDER_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "COLLIDER_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "COLLIDER_SERVER_PORT")]
    server_port: Option<u16>,

    /// Database path (overrides config file)
    #[arg(long, env = "COLLIDER_DB_PATH")]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,collider=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Collider - Particle Event Pipeline");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    if let Some(path) = cli.db_path {
        config.database.path = path;
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Database: {}",
        config.server.bind,
        config.server.port,
        config.database.path,
    );

    // Build storage layer
    let store: Arc<dyn EventStore> = Arc::new(DuckDbStore::open_with_pool_size(
        &config.database.path,
        config.database.pool_size,
    )?);
    tracing::info!("Storage initialized");

    // Start the ingestion pipeline
    let pipeline = Pipeline::start(&config.pipeline, Arc::clone(&store));

    // Create web server state
    let app_state = AppState {
        query: EventQueryService::new(Arc::clone(&store)),
        monitor: pipeline.monitor(),
        store: Arc::clone(&store),
    };

    // Build Axum router
    let app = create_router(app_state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the pipeline, then close storage.
    tracing::info!("Shutting down pipeline...");
    let report = pipeline.shutdown().await;
    if !report.is_clean() {
        tracing::warn!(
            undelivered = report.undelivered_events,
            failures = report.drain_failures,
            "Pipeline shut down with undelivered events"
        );
    }

    tracing::info!("Shutting down storage...");
    if let Err(e) = store.shutdown().await {
        tracing::error!("Failed to shutdown storage: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
