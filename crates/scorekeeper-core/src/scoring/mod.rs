//! Deferred scoring of accepted submissions.
//!
//! - `config`: `ScoringConfig` and its environment overrides
//! - `worker`: one job, with retries, timeouts and the terminal write
//! - `queue`: bounded channel + dispatcher running jobs concurrently

pub mod config;
pub mod queue;
pub mod worker;

pub use config::ScoringConfig;
pub use queue::{NoopScheduler, QueueHandle, ScheduleError, ScoreScheduler, ScoringQueue};
pub use worker::{ScoreOutcome, ScoringWorker};
