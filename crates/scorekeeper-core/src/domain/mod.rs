//! Domain models for Scorekeeper.
//!
//! Pure building blocks of the pipeline:
//! - `validation`: delimited-file format rules
//! - `metric`: numeric scoring functions
//! - `task`: answer-key pairing and scoring
//! - `error`: the error taxonomy shared by every stage

pub mod error;
pub mod metric;
pub mod task;
pub mod validation;

pub use error::{FormatProblem, MetricError, ProblemKind, Result, ScorekeeperError};
pub use metric::{ClassificationMetric, MetricKind};
pub use task::{paired_values, Task};
pub use validation::{Record, SubmissionFormat, ANSWER_HEADER};
