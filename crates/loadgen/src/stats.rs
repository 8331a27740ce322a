//! Shared, lock-guarded run counters.
//!
//! [`SharedStats`] is the only mutable state shared between workers and
//! the reporter. Every read and write goes through one mutex, and the
//! guard never outlives the method call, so it is never held across I/O.

use std::sync::Arc;

use imago_core::stats::{RunStatistics, StatsSnapshot};
use imago_core::types::Outcome;
use tokio::sync::Mutex;

/// Cheaply cloneable handle to the run's [`RunStatistics`].
#[derive(Debug, Clone, Default)]
pub struct SharedStats {
    inner: Arc<Mutex<RunStatistics>>,
}

impl SharedStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt outcome under the lock.
    pub async fn record(&self, outcome: Outcome) {
        self.inner.lock().await.record(outcome);
    }

    /// Consistent point-in-time read of both counters.
    pub async fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().await.snapshot()
    }
}
