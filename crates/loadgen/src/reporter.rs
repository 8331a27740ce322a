//! Periodic progress reporter.
//!
//! Wakes on a fixed interval, takes a snapshot of the shared counters
//! and logs it. Runs until its [`CancellationToken`] is triggered; a tick
//! that is ready at the same moment as the stop signal is discarded. The
//! counters are read once more on stop, after every worker has finished.

use std::time::Duration;

use imago_core::stats::StatsSnapshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::stats::SharedStats;

/// Default interval between progress lines.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// What a finished reporter saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    /// Progress lines logged while the run was in flight.
    pub reports: u64,
    /// Counters read when the stop signal arrived.
    pub final_snapshot: StatsSnapshot,
}

/// Background task that logs run progress.
pub struct Reporter {
    stats: SharedStats,
    interval: Duration,
}

impl Reporter {
    pub fn new(stats: SharedStats, interval: Duration) -> Self {
        Self { stats, interval }
    }

    /// Run the reporting loop until `cancel` is triggered.
    ///
    /// The first report is emitted one full interval after start. A zero
    /// interval, or one too long to schedule, disables periodic reports
    /// but still waits for `cancel`.
    pub async fn run(&self, cancel: CancellationToken) -> ReportSummary {
        let start = Instant::now()
            .checked_add(self.interval)
            .filter(|_| !self.interval.is_zero());
        let Some(start) = start else {
            tracing::warn!(
                interval_secs = self.interval.as_secs(),
                "Report interval cannot be scheduled, periodic reports disabled",
            );
            cancel.cancelled().await;
            return self.finish(0).await;
        };

        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reports = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.report_once().await;
                    reports += 1;
                }
            }
        }

        self.finish(reports).await
    }

    async fn finish(&self, reports: u64) -> ReportSummary {
        let final_snapshot = self.stats.snapshot().await;
        tracing::debug!(reports, total = final_snapshot.total, "Reporter stopping");
        ReportSummary {
            reports,
            final_snapshot,
        }
    }

    /// Take one snapshot under the lock and log it.
    pub async fn report_once(&self) -> StatsSnapshot {
        let snap = self.stats.snapshot().await;
        tracing::info!(
            total = snap.total,
            errors = snap.errors,
            "Total: {}, errors: {}",
            snap.total,
            snap.errors,
        );
        snap
    }
}
