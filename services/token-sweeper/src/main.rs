//! Expired-token sweeper
//!
//! Small binary that deletes expired access tokens from the token file.
//! Runs once by default; with `sweep.interval_secs` set it loops on that
//! cadence until SIGTERM/SIGINT. Meant to run out of band (cron, systemd
//! timer, or as a long-lived sidecar), never in the request path.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use token_core::OsSecretGenerator;
use token_manager::TokenManager;
use token_store::FileStore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting token-sweeper");

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        store_path = %config.store.path.display(),
        interval_secs = config.sweep.interval_secs,
        "configuration loaded"
    );

    let store = FileStore::load(config.store.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open token file {}",
                config.store.path.display()
            )
        })?;

    let manager = TokenManager::new(Arc::new(store), Arc::new(OsSecretGenerator));

    if config.sweep.interval_secs == 0 {
        sweep_once(&manager).await?;
        return Ok(());
    }

    let interval = Duration::from_secs(config.sweep.interval_secs);
    loop {
        sweep_once(&manager).await?;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_signal() => {
                info!("shutdown complete");
                return Ok(());
            }
        }
    }
}

async fn sweep_once(manager: &TokenManager) -> Result<()> {
    let removed = manager
        .purge_expired()
        .await
        .context("failed to purge expired tokens")?;

    if removed > 0 {
        info!(removed, "removed expired access tokens");
    } else {
        info!("no expired access tokens found");
    }
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
