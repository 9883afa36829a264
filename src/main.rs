//! Gateguard - Entry point.
//!
//! Watches the default gateway of the current network and logs an alert
//! when its hardware address no longer matches the one trusted for that
//! network.

use std::borrow::Cow;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gateguard::config::Config;
use gateguard::engine::DetectionEngine;
use gateguard::network::{MacResolver, ProcessRunner, SystemContext};
use gateguard::scheduler::{LogSink, Scheduler};
use gateguard::trust::FileTrustStore;

async fn run() -> Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("config.toml"));
    let config = Config::load(config_path.as_ref()).context("Failed to load configuration")?;

    // Initialize metrics (must be done early, before any metrics are recorded)
    gateguard::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!("Starting gateguard...");
    info!("Check interval: {} seconds", config.interval_secs);
    info!(
        "Mismatch threshold: {} cycle(s)",
        config.detection.mismatch_threshold
    );

    let store = FileTrustStore::open(&config.trust_store.path)
        .await
        .context("Failed to open trust store")?;
    info!(
        "Trust store {} holds {} network(s)",
        store.path().display(),
        store.len()
    );

    let runner = ProcessRunner::new();
    let context = SystemContext::new(
        runner,
        &config.network,
        config.resolver.command_timeout(),
    );
    let resolver = MacResolver::new(runner, &config.resolver);
    let engine = DetectionEngine::new(context, resolver, store, &config.detection);
    let sink = LogSink::new(config.detection.unverified_warn_after);

    let handle = Scheduler::new(config.interval()).start(engine, sink);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, shutting down...");

    let completed = handle.stop().await;
    info!("Shutdown complete after {completed} cycle(s).");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    run().await
}
