//! Worker pool and result aggregation.
//!
//! [`LoadTest::run`] spawns `concurrency` workers, each making `count`
//! sequential attempts through a [`Submitter`] and folding every outcome
//! into [`SharedStats`]. A [`Reporter`] logs progress in the background
//! and is stopped once all workers have signalled completion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use imago_core::stats::StatsSnapshot;
use imago_core::types::WorkerId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::reporter::{ReportSummary, Reporter, DEFAULT_REPORT_INTERVAL};
use crate::stats::SharedStats;
use crate::submitter::Submitter;

/// Shape of a run: how many workers and how many attempts each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub concurrency: usize,
    pub count: u32,
}

impl RunPlan {
    /// Attempts the run makes when every worker completes.
    pub fn expected_total(&self) -> u64 {
        self.concurrency as u64 * u64::from(self.count)
    }
}

/// Final result of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    /// Workers that signalled completion. Less than `concurrency` only
    /// if a worker task panicked.
    pub finished_workers: usize,
    pub elapsed: Duration,
    /// `None` when no reporter ran (zero concurrency) or its task failed.
    pub reporter: Option<ReportSummary>,
}

/// A configured load test, consumed by [`LoadTest::run`].
pub struct LoadTest {
    submitter: Arc<dyn Submitter>,
    plan: RunPlan,
    report_interval: Duration,
    stats: SharedStats,
}

impl LoadTest {
    pub fn new(submitter: Arc<dyn Submitter>, plan: RunPlan) -> Self {
        Self {
            submitter,
            plan,
            report_interval: DEFAULT_REPORT_INTERVAL,
            stats: SharedStats::new(),
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Handle to the live counters, for observing a run in progress.
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Run every worker to completion and return the final counters.
    pub async fn run(self) -> RunSummary {
        let RunPlan { concurrency, count } = self.plan;
        let started = Instant::now();

        tracing::info!(
            concurrency,
            count,
            "Running test with {} workers, {} requests per worker",
            concurrency,
            count,
        );

        if concurrency == 0 {
            return RunSummary {
                stats: self.stats.snapshot().await,
                finished_workers: 0,
                elapsed: started.elapsed(),
                reporter: None,
            };
        }

        let (done_tx, mut done_rx) = mpsc::channel::<WorkerId>(concurrency);

        let workers: Vec<JoinHandle<()>> = (0..concurrency)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    count,
                    Arc::clone(&self.submitter),
                    self.stats.clone(),
                    done_tx.clone(),
                ))
            })
            .collect();
        // Only workers hold senders now, so `recv` yields `None` once they are all gone.
        drop(done_tx);

        let cancel = CancellationToken::new();
        let reporter = Reporter::new(self.stats.clone(), self.report_interval);
        let reporter_handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { reporter.run(cancel).await }
        });

        let mut finished_workers = 0usize;
        while finished_workers < concurrency {
            match done_rx.recv().await {
                Some(id) => {
                    finished_workers += 1;
                    tracing::info!(worker_id = id, "Worker {} finished", id);
                }
                None => {
                    tracing::error!(
                        finished_workers,
                        concurrency,
                        "Workers exited without signalling completion",
                    );
                    break;
                }
            }
        }

        cancel.cancel();
        let reporter = match reporter_handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "Reporter task failed");
                None
            }
        };

        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        let stats = self.stats.snapshot().await;
        let elapsed = started.elapsed();
        tracing::info!(
            total = stats.total,
            errors = stats.errors,
            elapsed_ms = elapsed.as_millis() as u64,
            "Total: {}, errors: {}",
            stats.total,
            stats.errors,
        );

        RunSummary {
            stats,
            finished_workers,
            elapsed,
            reporter,
        }
    }
}

/// One worker: `count` sequential attempts, then a completion signal.
///
/// Failed attempts are counted, never fatal.
async fn worker(
    id: WorkerId,
    count: u32,
    submitter: Arc<dyn Submitter>,
    stats: SharedStats,
    done: mpsc::Sender<WorkerId>,
) {
    for _ in 0..count {
        let outcome = submitter.attempt(id).await;
        stats.record(outcome).await;
    }

    if done.send(id).await.is_err() {
        tracing::debug!(worker_id = id, "Coordinator gone before completion signal");
    }
}
