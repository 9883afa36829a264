//! Configuration loading and validation.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Main configuration for the gateway watcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds between two detection cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Where the gateway and network identity come from.
    #[serde(default)]
    pub network: NetworkSettings,

    /// Hardware address resolution settings.
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Persistent trust store settings.
    #[serde(default)]
    pub trust_store: TrustStoreSettings,

    /// Verdict policy settings.
    #[serde(default)]
    pub detection: DetectionSettings,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Network context settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSettings {
    /// Interface to query for the access point identifier.
    /// If None, the interface of the default route is used.
    pub interface: Option<String>,

    /// Gateway IP address. If None, read from the routing table.
    pub gateway_ip: Option<Ipv4Addr>,

    /// Static network identifier. If None, the access point BSSID is used.
    /// Set this on wired hosts where no BSSID exists.
    pub network_id: Option<String>,

    /// Kernel routing table pseudo-file.
    #[serde(default = "default_route_table_path")]
    pub route_table_path: PathBuf,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            interface: None,
            gateway_ip: None,
            network_id: None,
            route_table_path: default_route_table_path(),
        }
    }
}

/// Settings for the neighbor table and ARP cache lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSettings {
    /// Command listing the live neighbor table.
    #[serde(default = "default_neighbor_command")]
    pub neighbor_command: Vec<String>,

    /// Liveness probe; the target IP is appended as the last argument.
    #[serde(default = "default_probe_command")]
    pub probe_command: Vec<String>,

    /// Kernel ARP cache pseudo-file.
    #[serde(default = "default_arp_cache_path")]
    pub arp_cache_path: PathBuf,

    /// Number of ARP cache reads before giving up.
    #[serde(default = "default_arp_cache_attempts")]
    pub arp_cache_attempts: u32,

    /// Pause between two ARP cache reads, in milliseconds.
    #[serde(default = "default_arp_cache_retry_delay_ms")]
    pub arp_cache_retry_delay_ms: u64,

    /// Timeout applied to each external command, in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            neighbor_command: default_neighbor_command(),
            probe_command: default_probe_command(),
            arp_cache_path: default_arp_cache_path(),
            arp_cache_attempts: default_arp_cache_attempts(),
            arp_cache_retry_delay_ms: default_arp_cache_retry_delay_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl ResolverSettings {
    pub const fn arp_cache_retry_delay(&self) -> Duration {
        Duration::from_millis(self.arp_cache_retry_delay_ms)
    }

    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Trust store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustStoreSettings {
    /// File holding the `safe_macs` table.
    #[serde(default = "default_trust_store_path")]
    pub path: PathBuf,
}

impl Default for TrustStoreSettings {
    fn default() -> Self {
        Self {
            path: default_trust_store_path(),
        }
    }
}

/// Verdict policy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionSettings {
    /// Consecutive mismatching cycles required before reporting spoofing.
    /// 1 reports on the first mismatch.
    #[serde(default = "default_mismatch_threshold")]
    pub mismatch_threshold: u32,

    /// Consecutive indeterminate cycles before warning that the gateway
    /// cannot be verified.
    #[serde(default = "default_unverified_warn_after")]
    pub unverified_warn_after: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            mismatch_threshold: default_mismatch_threshold(),
            unverified_warn_after: default_unverified_warn_after(),
        }
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Address of the `/metrics` HTTP listener.
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

const fn default_interval_secs() -> u64 {
    5
}

fn default_route_table_path() -> PathBuf {
    PathBuf::from("/proc/net/route")
}

fn default_neighbor_command() -> Vec<String> {
    vec!["ip".into(), "neigh".into(), "show".into()]
}

fn default_probe_command() -> Vec<String> {
    vec!["ping".into(), "-c".into(), "1".into(), "-W".into(), "1".into()]
}

fn default_arp_cache_path() -> PathBuf {
    PathBuf::from("/proc/net/arp")
}

const fn default_arp_cache_attempts() -> u32 {
    3
}

const fn default_arp_cache_retry_delay_ms() -> u64 {
    300
}

const fn default_command_timeout_ms() -> u64 {
    3000
}

fn default_trust_store_path() -> PathBuf {
    PathBuf::from("safe_macs.toml")
}

const fn default_mismatch_threshold() -> u32 {
    1
}

const fn default_unverified_warn_after() -> u32 {
    3
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9185))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::ZeroInterval);
        }

        if self.resolver.arp_cache_attempts == 0 {
            return Err(ValidationError::ZeroArpCacheAttempts);
        }

        if self.resolver.command_timeout_ms == 0 {
            return Err(ValidationError::ZeroCommandTimeout);
        }

        if is_empty_command(&self.resolver.neighbor_command) {
            return Err(ValidationError::EmptyCommand {
                field: "neighbor_command",
            });
        }

        if is_empty_command(&self.resolver.probe_command) {
            return Err(ValidationError::EmptyCommand {
                field: "probe_command",
            });
        }

        if let Some(id) = &self.network.network_id
            && id.trim().is_empty()
        {
            return Err(ValidationError::EmptyNetworkId);
        }

        if self.trust_store.path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyTrustStorePath);
        }

        if self.detection.mismatch_threshold == 0 {
            return Err(ValidationError::ZeroMismatchThreshold);
        }

        if self.detection.unverified_warn_after == 0 {
            return Err(ValidationError::ZeroUnverifiedWarnAfter);
        }

        Ok(())
    }
}

fn is_empty_command(command: &[String]) -> bool {
    command.first().is_none_or(|program| program.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn validation_error(toml: &str) -> ValidationError {
        match Config::parse(toml) {
            Err(Error::Config(ConfigError::Validation(err))) => err,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.interval(), Duration::from_secs(5));
        assert!(config.network.interface.is_none());
        assert!(config.network.gateway_ip.is_none());
        assert!(config.network.network_id.is_none());
        assert_eq!(
            config.network.route_table_path,
            PathBuf::from("/proc/net/route")
        );
        assert_eq!(config.resolver.neighbor_command, ["ip", "neigh", "show"]);
        assert_eq!(config.resolver.probe_command[0], "ping");
        assert_eq!(config.resolver.arp_cache_path, PathBuf::from("/proc/net/arp"));
        assert_eq!(config.resolver.arp_cache_attempts, 3);
        assert_eq!(
            config.resolver.arp_cache_retry_delay(),
            Duration::from_millis(300)
        );
        assert_eq!(config.trust_store.path, PathBuf::from("safe_macs.toml"));
        assert_eq!(config.detection.mismatch_threshold, 1);
        assert_eq!(config.detection.unverified_warn_after, 3);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            interval_secs = 10

            [network]
            interface = "wlan0"
            gateway_ip = "192.168.1.1"
            network_id = "home"

            [resolver]
            neighbor_command = ["ip", "neighbor"]
            probe_command = ["ping", "-c", "1"]
            arp_cache_path = "/tmp/arp"
            arp_cache_attempts = 5
            arp_cache_retry_delay_ms = 100
            command_timeout_ms = 1500

            [trust_store]
            path = "/var/lib/gateguard/safe_macs.toml"

            [detection]
            mismatch_threshold = 2
            unverified_warn_after = 6

            [metrics]
            enabled = true
            listen = "0.0.0.0:9000"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.network.interface.as_deref(), Some("wlan0"));
        assert_eq!(
            config.network.gateway_ip,
            Some(Ipv4Addr::new(192, 168, 1, 1))
        );
        assert_eq!(config.network.network_id.as_deref(), Some("home"));
        assert_eq!(config.resolver.neighbor_command, ["ip", "neighbor"]);
        assert_eq!(config.resolver.arp_cache_attempts, 5);
        assert_eq!(config.resolver.command_timeout(), Duration::from_millis(1500));
        assert_eq!(config.detection.mismatch_threshold, 2);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen.port(), 9000);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert_eq!(
            validation_error("interval_secs = 0"),
            ValidationError::ZeroInterval
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let toml = r#"
            [resolver]
            arp_cache_attempts = 0
        "#;

        assert_eq!(validation_error(toml), ValidationError::ZeroArpCacheAttempts);
    }

    #[test]
    fn test_empty_neighbor_command_rejected() {
        let toml = r#"
            [resolver]
            neighbor_command = []
        "#;

        assert_eq!(
            validation_error(toml),
            ValidationError::EmptyCommand {
                field: "neighbor_command"
            }
        );
    }

    #[test]
    fn test_blank_network_id_rejected() {
        let toml = r#"
            [network]
            network_id = "  "
        "#;

        assert_eq!(validation_error(toml), ValidationError::EmptyNetworkId);
    }

    #[test]
    fn test_zero_mismatch_threshold_rejected() {
        let toml = r#"
            [detection]
            mismatch_threshold = 0
        "#;

        assert_eq!(validation_error(toml), ValidationError::ZeroMismatchThreshold);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            unknown_field = "value"
        "#;

        assert!(matches!(
            Config::parse(toml),
            Err(Error::Config(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn test_invalid_gateway_rejected() {
        let toml = r#"
            [network]
            gateway_ip = "not-an-ip"
        "#;

        assert!(Config::parse(toml).is_err());
    }
}
