//! Error types for the gateway watcher.

use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for gateguard operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("trust store error: {0}")]
    TrustStore(#[from] TrustStoreError),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("interval_secs must be greater than 0")]
    ZeroInterval,

    #[error("resolver.arp_cache_attempts must be greater than 0")]
    ZeroArpCacheAttempts,

    #[error("resolver.command_timeout_ms must be greater than 0")]
    ZeroCommandTimeout,

    #[error("resolver.{field} cannot be empty")]
    EmptyCommand { field: &'static str },

    #[error("network.network_id cannot be empty")]
    EmptyNetworkId,

    #[error("trust_store.path cannot be empty")]
    EmptyTrustStorePath,

    #[error("detection.mismatch_threshold must be greater than 0")]
    ZeroMismatchThreshold,

    #[error("detection.unverified_warn_after must be greater than 0")]
    ZeroUnverifiedWarnAfter,
}

/// Errors raised while running an external diagnostic command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command {program:?} did not exit within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("command {program:?} not found")]
    NotFound { program: String },

    #[error("command {program:?} exited with status {status:?}")]
    Failed { program: String, status: Option<i32> },

    #[error("failed to run {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Expected, per-cycle conditions that make a verdict impossible.
///
/// These never escape a detection cycle: the engine turns them into
/// [`DetectionResult::Indeterminate`](crate::engine::DetectionResult::Indeterminate).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectError {
    #[error("network context unavailable: {0}")]
    ContextUnavailable(&'static str),

    #[error("no hardware address found for {0}")]
    ResolutionNotFound(Ipv4Addr),
}

/// Trust store persistence errors.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("failed to read trust store {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write trust store {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse trust store {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize trust store: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
