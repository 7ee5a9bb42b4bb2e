//! Global atomic counters for Scorekeeper.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on daemon shutdown or after a drain).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    submissions_accepted: AtomicU64,
    submissions_rejected: AtomicU64,
    scores_recorded: AtomicU64,
    scoring_failures: AtomicU64,
    scoring_retries: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submissions_accepted: u64,
    pub submissions_rejected: u64,
    pub scores_recorded: u64,
    pub scoring_failures: u64,
    pub scoring_retries: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            submissions_accepted: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            scores_recorded: AtomicU64::new(0),
            scoring_failures: AtomicU64::new(0),
            scoring_retries: AtomicU64::new(0),
        }
    }

    pub fn inc_accepted(&self) {
        self.submissions_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "submissions_accepted", "counter incremented");
    }

    pub fn inc_rejected(&self) {
        self.submissions_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "submissions_rejected", "counter incremented");
    }

    pub fn inc_scored(&self) {
        self.scores_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scores_recorded", "counter incremented");
    }

    pub fn inc_failures(&self) {
        self.scoring_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scoring_failures", "counter incremented");
    }

    pub fn inc_retries(&self) {
        self.scoring_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scoring_retries", "counter incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submissions_accepted: self.submissions_accepted.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            scores_recorded: self.scores_recorded.load(Ordering::Relaxed),
            scoring_failures: self.scoring_failures.load(Ordering::Relaxed),
            scoring_retries: self.scoring_retries.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            submissions_accepted = s.submissions_accepted,
            submissions_rejected = s.submissions_rejected,
            scores_recorded = s.scores_recorded,
            scoring_failures = s.scoring_failures,
            scoring_retries = s.scoring_retries,
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.submissions_accepted.store(0, Ordering::Relaxed);
        self.submissions_rejected.store(0, Ordering::Relaxed);
        self.scores_recorded.store(0, Ordering::Relaxed);
        self.scoring_failures.store(0, Ordering::Relaxed);
        self.scoring_retries.store(0, Ordering::Relaxed);
    }
}
