//! Scorekeeper Core Library
//!
//! The submission pipeline: format validation, ingest, deferred scoring and
//! the scoreboard, plus the tracing and counter helpers the binaries share.

pub mod domain;
pub mod ingest;
pub mod metrics;
pub mod obs;
pub mod scoreboard;
pub mod scoring;
pub mod telemetry;

pub use domain::{
    ClassificationMetric, FormatProblem, MetricError, MetricKind, ProblemKind, Record, Result,
    ScorekeeperError, SubmissionFormat, Task, ANSWER_HEADER,
};

pub use ingest::{answer_map, SubmissionIngest};
pub use scoreboard::{rank_best_scores, BestScore, HistoryEntry, Scoreboard, ScoreboardEntry};
pub use scoring::{
    NoopScheduler, QueueHandle, ScheduleError, ScoreOutcome, ScoreScheduler, ScoringConfig,
    ScoringQueue, ScoringWorker,
};

pub use scorekeeper_state::{
    ParticipantId, ParticipantRecord, ScoreStatus, SubmissionId, SubmissionRecord, TaskId,
    TaskRecord,
};

pub use metrics::METRICS;
pub use obs::{
    emit_score_recorded, emit_scoring_failed, emit_scoring_retry, emit_scoring_started,
    emit_submission_accepted, emit_submission_rejected, submission_span,
};
pub use telemetry::init_tracing;

/// Scorekeeper version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
