// ABOUTME: Entry point for the listd binary.
// ABOUTME: Parses CLI arguments, initializes tracing, recovers the store, and serves HTTP until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use listd_server::{AppState, ListdConfig, create_router};
use listd_store::{StorageLayout, spawn_snapshot_task};
use tokio::sync::watch;

/// Durable named integer lists over HTTP.
#[derive(Parser, Debug)]
#[command(name = "listd", version, about, long_about = None)]
struct Cli {
    /// Data directory holding logs/ and snapshots/ (overrides LISTD_HOME)
    #[arg(long)]
    home: Option<PathBuf>,

    /// Address to listen on (overrides LISTD_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Seconds between background snapshots (overrides LISTD_SNAPSHOT_INTERVAL_SECS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    snapshot_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "listd=info,listd_store=info,listd_server=info,tower_http=info",
                )
            }),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ListdConfig::from_env().context("invalid configuration")?;
    if let Some(home) = cli.home {
        config.home = home;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(secs) = cli.snapshot_interval_secs {
        config.snapshot_interval = std::time::Duration::from_secs(secs);
    }

    tracing::info!(home = %config.home.display(), bind = %config.bind, "listd starting up");
    run(config).await
}

async fn run(config: ListdConfig) -> anyhow::Result<()> {
    let layout = StorageLayout::new(config.home.clone())
        .with_context(|| format!("failed to prepare {}", config.home.display()))?;
    let (service, stats) = layout
        .open_service()
        .context("failed to recover list store")?;
    tracing::info!(applied = stats.applied, malformed = stats.malformed, "store ready");

    let service = Arc::new(service);
    let snapshots = layout.snapshots();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let snapshot_task = spawn_snapshot_task(
        Arc::clone(&service),
        snapshots.clone(),
        config.snapshot_interval,
        shutdown_rx,
    );

    let app = create_router(Arc::new(AppState::new(Arc::clone(&service), snapshots.clone())));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!("listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = snapshot_task.await {
        tracing::warn!("snapshot task ended abnormally: {}", e);
    }

    let saved = tokio::task::spawn_blocking(move || service.snapshot(&snapshots))
        .await
        .context("final snapshot task failed")?;
    match saved {
        Ok(watermark) => tracing::info!(watermark = %watermark.to_rfc3339(), "final snapshot saved"),
        Err(e) => tracing::warn!("final snapshot failed, the operation log still covers it: {}", e),
    }

    tracing::info!("listd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
