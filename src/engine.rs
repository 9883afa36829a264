//! Detection engine.
//!
//! One cycle turns the current network context into a [`DetectionResult`]:
//!
//! 1. Look up the gateway IP and the network identity
//! 2. Probe the gateway so the kernel refreshes its neighbor entry
//! 3. Resolve the gateway hardware address
//! 4. Compare it with the address trusted for this network
//!
//! The first address seen on a network becomes its trusted address. A later
//! mismatch is reported and the trusted address is left untouched.

use std::fmt;
use std::future::Future;

use metrics::{counter, gauge};
use pnet::util::MacAddr;
use tracing::{debug, info, instrument, warn};

use crate::config::DetectionSettings;
use crate::error::{DetectError, Error, Result};
use crate::metrics::{CYCLES_TOTAL, MISMATCH_STREAK, TRUST_RECORDS_CREATED_TOTAL};
use crate::network::{CommandRunner, MacResolver, NetworkContext, NetworkId};
use crate::trust::TrustStore;

/// Outcome of one detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionResult {
    /// The gateway matches the trusted address, or the network is new.
    Stable,
    /// The gateway hardware address differs from the trusted one.
    Spoofed,
    /// The gateway could not be verified this cycle.
    Indeterminate,
}

impl DetectionResult {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Spoofed => "spoofed",
            Self::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of periodic work driven by the [`Scheduler`](crate::scheduler::Scheduler).
///
/// An `Err` is an internal fault: the scheduler logs it and reports the
/// cycle as [`DetectionResult::Indeterminate`].
pub trait Cycle: Send + 'static {
    fn run_cycle(&mut self) -> impl Future<Output = Result<DetectionResult>> + Send;
}

/// Consecutive mismatches observed on one network.
#[derive(Debug)]
struct MismatchStreak {
    network: NetworkId,
    count: u32,
}

/// Gateway spoofing detector.
pub struct DetectionEngine<N, R, T>
where
    N: NetworkContext,
    R: CommandRunner,
    T: TrustStore,
{
    context: N,
    resolver: MacResolver<R>,
    store: T,
    mismatch_threshold: u32,
    streak: Option<MismatchStreak>,
}

impl<N, R, T> DetectionEngine<N, R, T>
where
    N: NetworkContext,
    R: CommandRunner,
    T: TrustStore,
{
    /// Create a new engine.
    pub fn new(context: N, resolver: MacResolver<R>, store: T, settings: &DetectionSettings) -> Self {
        Self {
            context,
            resolver,
            store,
            mismatch_threshold: settings.mismatch_threshold.max(1),
            streak: None,
        }
    }

    /// Get a reference to the trust store.
    pub const fn store(&self) -> &T {
        &self.store
    }

    /// Run one detection cycle.
    ///
    /// Expected conditions (no gateway, no network identity, unresolvable
    /// hardware address) yield [`DetectionResult::Indeterminate`]. Only
    /// trust store failures are returned as errors.
    #[instrument(name = "detection_cycle", skip(self))]
    pub async fn cycle(&mut self) -> Result<DetectionResult> {
        let result = match self.evaluate().await {
            Ok(result) => result,
            Err(Error::Detect(err)) => {
                debug!("gateway not verified: {err}");
                DetectionResult::Indeterminate
            }
            Err(err) => return Err(err),
        };

        counter!(CYCLES_TOTAL, "result" => result.as_str()).increment(1);
        Ok(result)
    }

    async fn evaluate(&mut self) -> Result<DetectionResult> {
        let gateway = self
            .context
            .gateway_ip()
            .await
            .ok_or(DetectError::ContextUnavailable("no default gateway"))?;
        let network = self
            .context
            .network_id()
            .await
            .ok_or(DetectError::ContextUnavailable("network identity unknown"))?;

        self.resolver.probe(gateway).await;
        let observed = self.resolver.resolve(gateway).await?;

        let Some(trusted) = self.store.get(&network).await? else {
            self.store.put(network.clone(), observed).await?;
            counter!(TRUST_RECORDS_CREATED_TOTAL).increment(1);
            info!(%network, %gateway, mac = %observed, "trusting gateway of new network");
            self.reset_streak();
            return Ok(DetectionResult::Stable);
        };

        if trusted == observed {
            debug!(%network, %gateway, mac = %observed, "gateway matches trusted address");
            self.reset_streak();
            return Ok(DetectionResult::Stable);
        }

        Ok(self.record_mismatch(network, trusted, observed))
    }

    fn record_mismatch(
        &mut self,
        network: NetworkId,
        trusted: MacAddr,
        observed: MacAddr,
    ) -> DetectionResult {
        let streak = match self.streak.take() {
            Some(mut streak) if streak.network == network => {
                streak.count = streak.count.saturating_add(1);
                streak
            }
            _ => MismatchStreak { network, count: 1 },
        };
        let count = streak.count;
        gauge!(MISMATCH_STREAK).set(f64::from(count));

        let result = if count >= self.mismatch_threshold {
            warn!(
                network = %streak.network,
                %trusted,
                %observed,
                "gateway hardware address changed, possible ARP spoofing"
            );
            DetectionResult::Spoofed
        } else {
            info!(
                network = %streak.network,
                %trusted,
                %observed,
                count,
                threshold = self.mismatch_threshold,
                "gateway hardware address mismatch awaiting confirmation"
            );
            DetectionResult::Indeterminate
        };

        self.streak = Some(streak);
        result
    }

    fn reset_streak(&mut self) {
        if self.streak.take().is_some() {
            gauge!(MISMATCH_STREAK).set(0.0);
        }
    }
}

impl<N, R, T> Cycle for DetectionEngine<N, R, T>
where
    N: NetworkContext,
    R: CommandRunner,
    T: TrustStore,
{
    async fn run_cycle(&mut self) -> Result<DetectionResult> {
        self.cycle().await
    }
}
