use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use consult_ports::inbound::SweepTrigger;
use consult_ports::types::SweepReport;

/// Runs sweeps on a fixed cadence, at most one at a time.
pub struct SweepScheduler<T: SweepTrigger> {
    trigger: T,
    lease: Mutex<()>,
    cancel: CancellationToken,
}

impl<T: SweepTrigger> SweepScheduler<T> {
    pub fn new(trigger: T) -> Self {
        Self {
            trigger,
            lease: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Asks the running loop and any in-flight sweep to stop. The current
    /// item is finished first.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// One sweep, unless another is still running. Returns `None` when skipped.
    pub async fn tick(&self, now: DateTime<Utc>) -> Option<Result<SweepReport, T::Error>> {
        let Ok(_lease) = self.lease.try_lock() else {
            info!("previous sweep still running, skipping");
            return None;
        };
        Some(self.trigger.run_sweep(now, &self.cancel).await)
    }

    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(Utc::now()).await {
                Some(Ok(report)) if report.unresolved() > 0 || report.interrupted => {
                    warn!(
                        scanned = report.scanned,
                        escalated = report.escalated,
                        dead_ends = report.dead_ends,
                        failures = report.failures.len(),
                        interrupted = report.interrupted,
                        "sweep finished with unresolved consults"
                    );
                }
                Some(Ok(report)) => {
                    info!(
                        scanned = report.scanned,
                        overdue = report.overdue_flagged,
                        escalated = report.escalated,
                        "sweep finished"
                    );
                }
                Some(Err(e)) => error!(error = %e, "sweep aborted"),
                None => {}
            }
        }
        info!("sweep scheduler stopped");
    }
}
