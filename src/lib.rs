//! Gateguard - A gateway ARP spoofing detector.
//!
//! Gateguard periodically resolves the hardware address of the default
//! gateway and compares it with the address trusted for the current network.
//! A change on a previously trusted network is reported as possible ARP
//! spoofing.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`]: Configuration loading and validation
//! - [`network`]: Command execution, neighbor tables, MAC resolution and
//!   network context
//! - [`trust`]: Per-network trusted gateway addresses
//! - [`engine`]: The per-cycle detection logic
//! - [`scheduler`]: The periodic loop and verdict delivery
//! - [`error`]: Error types
//!
//! # Testing
//!
//! Every OS-facing dependency sits behind a trait so the detection logic can
//! be tested without a network:
//!
//! ```rust
//! use gateguard::network::parse_neighbor_table;
//!
//! let entries = parse_neighbor_table(["192.168.1.1 dev wlan0 lladdr aa:bb:cc:dd:ee:ff REACHABLE"]);
//! assert_eq!(entries[0].mac.to_string(), "aa:bb:cc:dd:ee:ff");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod network;
pub mod scheduler;
pub mod trust;

pub use config::Config;
pub use engine::{DetectionEngine, DetectionResult};
pub use error::{Error, Result};
