//! Metrics initialization for Prometheus exporter.

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::{Error, Result};

/// Detection cycles, labelled by `result`.
pub const CYCLES_TOTAL: &str = "gateguard_cycles_total";

/// Trust records written on first sight of a network.
pub const TRUST_RECORDS_CREATED_TOTAL: &str = "gateguard_trust_records_created_total";

/// Cycles that failed with an internal fault.
pub const CYCLE_FAULTS_TOTAL: &str = "gateguard_cycle_faults_total";

/// Current number of consecutive mismatching cycles.
pub const MISMATCH_STREAK: &str = "gateguard_mismatch_streak";

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape.
///
/// When metrics are disabled, this is a no-op. The `metrics` crate
/// handles unregistered metrics gracefully (they become no-ops).
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|err| Error::Metrics(err.to_string()))?;

    Ok(())
}
