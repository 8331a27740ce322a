//! Run counters aggregated across all workers.
//!
//! [`RunStatistics`] only changes through [`RunStatistics::record`], which
//! keeps `errors <= total` by construction. Callers share it behind a
//! single lock and read it through [`StatsSnapshot`] copies.

use crate::types::Outcome;

/// Aggregate attempt counters for one run.
#[derive(Debug, Default)]
pub struct RunStatistics {
    total: u64,
    errors: u64,
}

/// Point-in-time copy of [`RunStatistics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub errors: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one attempt outcome into the counters.
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        if outcome.is_failure() {
            self.errors += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total,
            errors: self.errors,
        }
    }
}

impl StatsSnapshot {
    pub fn successes(&self) -> u64 {
        self.total - self.errors
    }

    /// Fraction of attempts that failed, `0.0` before any attempt.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.errors as f64 / self.total as f64
    }
}
