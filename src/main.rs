//! Log rotation service
//!
//! Issues `logRotate` against a MongoDB server on a cron schedule and
//! post-processes the rotated file (archive, upload, delete).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::config::{Configuration, DEFAULT_CONFIG_FILE};
use common::storage::create_object_store;
use rotator::{AdminGateway, LogRotator, RemoteStorage, Scheduler};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Run a single rotation cycle and exit
    #[arg(long)]
    once: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(feature = "mongodb")]
fn create_gateway(config: &Configuration) -> Result<Arc<dyn AdminGateway>> {
    Ok(Arc::new(rotator::MongoGateway::from_config(&config.gateway)))
}

#[cfg(not(feature = "mongodb"))]
fn create_gateway(_config: &Configuration) -> Result<Arc<dyn AdminGateway>> {
    anyhow::bail!("logrotator was built without the `mongodb` feature")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    if !args.config.exists() {
        tracing::info!(
            path = %args.config.display(),
            "Configuration file not found, using defaults and environment"
        );
    }
    let config =
        Configuration::load_from_path(&args.config).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let storage = create_object_store(&config.rotation.storage)
        .context("Failed to create object store")?
        .zip(config.rotation.storage.bucket().map(str::to_string))
        .map(|(store, bucket)| RemoteStorage::new(store, bucket));

    let rotator = Arc::new(
        LogRotator::builder(config.rotation.clone(), create_gateway(&config)?)
            .with_remote_storage(storage)
            .build(),
    );

    if args.once {
        let result = rotator.rotate().await.context("Log rotation failed")?;
        tracing::info!(
            server_version = %result.server_version,
            artifact = ?result.artifact,
            "Rotation complete"
        );
        return Ok(());
    }

    let scheduler = Scheduler::build(&config.schedule, rotator)
        .context("Failed to create rotation schedule")?;

    // Running as a service always fires on schedule; auto_start matters for embedders
    scheduler
        .start()
        .context("Failed to start rotation schedule")?;
    if let Some(next) = scheduler.next_fire() {
        tracing::info!(schedule = %config.schedule, next = %next, "Log rotator running");
    }

    wait_for_shutdown_signal().await?;

    tracing::info!("Received shutdown signal, stopping log rotator");
    scheduler.stop();

    tracing::info!("Log rotator stopped");
    Ok(())
}
