//! Periodic detection loop.
//!
//! Runs a [`Cycle`] on a tokio task, delivers each result to a
//! [`VerdictSink`] and waits a fixed interval before the next cycle. Cycles
//! never overlap and verdicts are delivered in cycle order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{Cycle, DetectionResult};
use crate::metrics::CYCLE_FAULTS_TOTAL;

/// Result of one scheduled cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Cycle sequence number, starting at 1.
    pub cycle: u64,
    pub result: DetectionResult,
}

/// Receives verdicts from the scheduler.
///
/// This is the boundary with the presentation layer (notifications, UI,
/// logs). Implementations must not block.
pub trait VerdictSink: Send + Sync + 'static {
    fn deliver(&self, verdict: Verdict);
}

impl VerdictSink for mpsc::UnboundedSender<Verdict> {
    fn deliver(&self, verdict: Verdict) {
        // A closed receiver means nobody is listening anymore.
        let _ = self.send(verdict);
    }
}

/// Drives a detection cycle at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Start the loop on a new task.
    ///
    /// The first cycle runs immediately. Must be called from within a tokio
    /// runtime.
    pub fn start<C, S>(&self, cycle: C, sink: S) -> SchedulerHandle
    where
        C: Cycle,
        S: VerdictSink,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(cycle, sink, self.interval, stop_rx));
        SchedulerHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Handle to a running scheduler.
///
/// Dropping the handle also stops the loop at its next suspension point.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to finish.
    ///
    /// An in-flight cycle is abandoned; any external command it was
    /// waiting on is killed. Returns the number of cycles that completed.
    pub async fn stop(self) -> u64 {
        let _ = self.stop.send(true);
        match self.task.await {
            Ok(completed) => completed,
            Err(err) => {
                error!("scheduler task failed: {err}");
                0
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_loop<C, S>(
    mut cycle: C,
    sink: S,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> u64
where
    C: Cycle,
    S: VerdictSink,
{
    info!(?interval, "detection scheduler started");

    let mut completed: u64 = 0;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = stop.changed() => break,
            outcome = AssertUnwindSafe(cycle.run_cycle()).catch_unwind() => outcome,
        };
        completed += 1;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                counter!(CYCLE_FAULTS_TOTAL).increment(1);
                error!(cycle = completed, "detection cycle failed: {err}");
                DetectionResult::Indeterminate
            }
            Err(payload) => {
                counter!(CYCLE_FAULTS_TOTAL).increment(1);
                error!(
                    cycle = completed,
                    "detection cycle panicked: {}",
                    panic_message(payload.as_ref())
                );
                DetectionResult::Indeterminate
            }
        };
        sink.deliver(Verdict {
            cycle: completed,
            result,
        });

        tokio::select! {
            biased;
            _ = stop.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    info!(cycles = completed, "detection scheduler stopped");
    completed
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Sink reporting verdicts through the log.
///
/// - spoofing is reported on every cycle
/// - a stable network is reported when it becomes stable
/// - indeterminate cycles are reported as "unable to verify" once they
///   persist, so they never look the same as a stable network
#[derive(Debug)]
pub struct LogSink {
    unverified_warn_after: u32,
    state: Mutex<LogState>,
}

#[derive(Debug, Default)]
struct LogState {
    last: Option<DetectionResult>,
    indeterminate_streak: u32,
}

impl LogSink {
    pub fn new(unverified_warn_after: u32) -> Self {
        Self {
            unverified_warn_after: unverified_warn_after.max(1),
            state: Mutex::new(LogState::default()),
        }
    }

    /// Most recent result delivered.
    pub fn last_result(&self) -> Option<DetectionResult> {
        self.state.lock().last
    }

    /// Whether the gateway has gone unverified for too many cycles.
    pub fn is_unverified(&self) -> bool {
        self.state.lock().indeterminate_streak >= self.unverified_warn_after
    }
}

impl VerdictSink for LogSink {
    fn deliver(&self, verdict: Verdict) {
        let mut state = self.state.lock();
        let cycle = verdict.cycle;

        match verdict.result {
            DetectionResult::Spoofed => {
                state.indeterminate_streak = 0;
                error!(
                    cycle,
                    "possible ARP spoofing detected: gateway hardware address changed"
                );
            }
            DetectionResult::Stable => {
                state.indeterminate_streak = 0;
                if state.last == Some(DetectionResult::Stable) {
                    debug!(cycle, "network stable");
                } else {
                    info!(cycle, "network seems stable");
                }
            }
            DetectionResult::Indeterminate => {
                state.indeterminate_streak = state.indeterminate_streak.saturating_add(1);
                if state.indeterminate_streak == self.unverified_warn_after {
                    warn!(
                        cycle,
                        cycles = state.indeterminate_streak,
                        "unable to verify gateway"
                    );
                } else {
                    debug!(cycle, "gateway not verified this cycle");
                }
            }
        }

        state.last = Some(verdict.result);
    }
}
