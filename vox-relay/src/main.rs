//! Vox Relay (vox-relay) - Main entry point
//!
//! Server binary bridging the upstream LLM token stream onto the
//! client-facing SSE event stream, with per-session message persistence.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vox_relay::api::{create_router, AppContext};
use vox_relay::db::SqliteStore;
use vox_relay::llm::OpenAiChatClient;

/// Command-line arguments for vox-relay
#[derive(Parser, Debug)]
#[command(name = "vox-relay")]
#[command(about = "Stream relay service for the Vox speech pipeline")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "VOX_RELAY_PORT")]
    port: u16,

    /// Data directory holding the message database
    #[arg(short, long, env = "VOX_DATA_DIR")]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vox_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Vox relay on port {}", args.port);

    let data_dir = vox_common::config::resolve_data_dir(args.data_dir.as_deref(), "VOX_DATA_DIR")
        .context("Failed to resolve data directory")?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    info!("Data directory: {}", data_dir.display());

    let store = SqliteStore::open(&data_dir.join("vox.db"))
        .await
        .context("Failed to open message database")?;

    let llm = OpenAiChatClient::from_env().context("Failed to configure LLM client")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ctx = AppContext {
        store: Arc::new(store),
        llm: Arc::new(llm),
        shutdown: shutdown_rx,
    };

    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Let in-flight relay loops observe the abort at their next
            // suspension point.
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
