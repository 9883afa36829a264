//! Gateway hardware address resolution.
//!
//! Chains the two neighbor sources into one fallback strategy:
//! 1. the live neighbor table, queried once
//! 2. the kernel ARP cache, read a bounded number of times since the kernel
//!    fills it asynchronously after the liveness probe

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use pnet::util::MacAddr;
use tracing::{debug, warn};

use super::command::CommandRunner;
use super::neighbor::{find_entry, parse_neighbor_table, read_arp_cache};
use crate::config::ResolverSettings;
use crate::error::{CommandError, DetectError};

/// Resolves IPv4 addresses to hardware addresses using OS neighbor state.
#[derive(Debug, Clone)]
pub struct MacResolver<R: CommandRunner> {
    runner: R,
    neighbor_command: Vec<String>,
    probe_command: Vec<String>,
    arp_cache_path: PathBuf,
    arp_cache_attempts: u32,
    arp_cache_retry_delay: Duration,
    command_timeout: Duration,
}

impl<R: CommandRunner> MacResolver<R> {
    /// Create a resolver from configuration.
    pub fn new(runner: R, settings: &ResolverSettings) -> Self {
        Self {
            runner,
            neighbor_command: settings.neighbor_command.clone(),
            probe_command: settings.probe_command.clone(),
            arp_cache_path: settings.arp_cache_path.clone(),
            arp_cache_attempts: settings.arp_cache_attempts.max(1),
            arp_cache_retry_delay: settings.arp_cache_retry_delay(),
            command_timeout: settings.command_timeout(),
        }
    }

    /// Send a single best-effort liveness probe to `ip`.
    ///
    /// The probe only exists to make the kernel refresh its neighbor entry.
    /// Its outcome never affects resolution.
    pub async fn probe(&self, ip: Ipv4Addr) {
        let Some((program, args)) = self.probe_command.split_first() else {
            return;
        };
        let mut args = args.to_vec();
        args.push(ip.to_string());

        match self.runner.run(program, &args, self.command_timeout).await {
            Ok(output) if output.success() => debug!(%ip, "liveness probe answered"),
            Ok(output) => debug!(%ip, status = ?output.status, "liveness probe unanswered"),
            Err(err) => debug!(%ip, "liveness probe failed: {err}"),
        }
    }

    /// Resolve the hardware address of `ip`.
    ///
    /// Returns [`DetectError::ResolutionNotFound`] when neither the neighbor
    /// table nor any of the ARP cache reads has an entry for `ip`.
    pub async fn resolve(&self, ip: Ipv4Addr) -> Result<MacAddr, DetectError> {
        match self.from_neighbor_table(ip).await {
            Ok(Some(mac)) => {
                debug!(%ip, %mac, "resolved from neighbor table");
                return Ok(mac);
            }
            Ok(None) => debug!(%ip, "no neighbor table entry, falling back to ARP cache"),
            Err(err) => debug!(%ip, "neighbor table unavailable: {err}"),
        }

        for attempt in 1..=self.arp_cache_attempts {
            match read_arp_cache(&self.arp_cache_path).await {
                Ok(entries) => {
                    if let Some(mac) = find_entry(&entries, ip) {
                        debug!(%ip, %mac, attempt, "resolved from ARP cache");
                        return Ok(mac);
                    }
                }
                Err(err) => warn!(
                    path = %self.arp_cache_path.display(),
                    attempt,
                    "failed to read ARP cache: {err}"
                ),
            }

            if attempt < self.arp_cache_attempts {
                tokio::time::sleep(self.arp_cache_retry_delay).await;
            }
        }

        Err(DetectError::ResolutionNotFound(ip))
    }

    async fn from_neighbor_table(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>, CommandError> {
        let Some((program, args)) = self.neighbor_command.split_first() else {
            return Ok(None);
        };

        let output = self
            .runner
            .run(program, args, self.command_timeout)
            .await?
            .require_success(program)?;

        Ok(find_entry(&parse_neighbor_table(&output.lines), ip))
    }
}
