//! Scoring worker configuration.

use std::time::Duration;

use crate::domain::{Result, ScorekeeperError};

/// Tuning knobs for the scoring queue and worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Jobs scored at the same time
    pub max_concurrency: usize,
    /// Bound of the in-process job channel
    pub queue_capacity: usize,
    /// Attempts (across restarts) before a submission is marked failed
    pub max_attempts: u32,
    /// Upper bound on one attempt
    pub attempt_timeout: Duration,
    /// Delay before the first retry; doubled on each further retry
    pub retry_backoff: Duration,
    /// Period of the sweep that re-enqueues submissions still pending
    pub recovery_interval: Duration,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            queue_capacity: 1024,
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(200),
            recovery_interval: Duration::from_secs(30),
        }
    }
}

/// Cap on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl ScoringConfig {
    /// Read overrides from the environment on top of the defaults.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `SCOREKEEPER_WORKERS` | `max_concurrency` |
    /// | `SCOREKEEPER_QUEUE_CAPACITY` | `queue_capacity` |
    /// | `SCOREKEEPER_MAX_ATTEMPTS` | `max_attempts` |
    /// | `SCOREKEEPER_SCORING_TIMEOUT_MS` | `attempt_timeout` |
    /// | `SCOREKEEPER_RETRY_BACKOFF_MS` | `retry_backoff` |
    /// | `SCOREKEEPER_RECOVERY_INTERVAL_MS` | `recovery_interval` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "SCOREKEEPER_WORKERS")? {
            config.max_concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, "SCOREKEEPER_QUEUE_CAPACITY")? {
            config.queue_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "SCOREKEEPER_MAX_ATTEMPTS")? {
            config.max_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "SCOREKEEPER_SCORING_TIMEOUT_MS")? {
            config.attempt_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "SCOREKEEPER_RETRY_BACKOFF_MS")? {
            config.retry_backoff = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "SCOREKEEPER_RECOVERY_INTERVAL_MS")? {
            config.recovery_interval = Duration::from_millis(v);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values the queue cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ScorekeeperError::Config("max_concurrency must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ScorekeeperError::Config("queue_capacity must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ScorekeeperError::Config("max_attempts must be at least 1".into()));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ScorekeeperError::Config("attempt_timeout must be positive".into()));
        }
        if self.recovery_interval.is_zero() {
            return Err(ScorekeeperError::Config("recovery_interval must be positive".into()));
        }
        Ok(())
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScorekeeperError::Config(format!("{key}: invalid value {raw:?}"))),
    }
}
