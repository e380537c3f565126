//! # panel-guard
//!
//! Serves the panel record over HTTP and WebSocket while the integrity
//! monitor snapshots and repairs it in the background.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::AppConfig;
use psg_store::{IntegrityMonitor, StateStore};
use psg_sync::{serve, SyncService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "panel-guard")]
#[command(about = "Validated, self-repairing panel state with live sync")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overrides [sync].bind_addr
    #[arg(long)]
    bind: Option<String>,

    /// Data directory, overrides [storage].data_dir
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(cli.bind, cli.data_dir);

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.storage.data_dir.display())
    })?;

    let store = Arc::new(StateStore::open(&config.storage)?);
    let outcome = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.load_outcome()).await?
    };
    info!(path = %store.path().display(), state = ?outcome.state, "Panel record loaded");

    let monitor = IntegrityMonitor::new(store.clone(), config.monitor.clone()).spawn();
    let service = Arc::new(SyncService::new(store, config.sync.clone()));

    let listener = TcpListener::bind(&config.sync.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.sync.bind_addr))?;

    let served = serve(listener, service, shutdown_signal()).await;

    monitor.shutdown().await;
    served?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
