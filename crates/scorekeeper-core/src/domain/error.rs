//! Domain-level error taxonomy for Scorekeeper.

use std::time::Duration;

use scorekeeper_state::{StorageError, TaskId};
use serde::Serialize;

/// What is wrong with one line of a submission file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ProblemKind {
    #[error("bad header: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("unexpected record length: expected {expected} fields, found {found}")]
    RecordLengthMismatch { expected: usize, found: usize },

    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("file is not valid UTF-8: {message}")]
    Encoding { message: String },
}

/// A single format problem, located by 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct FormatProblem {
    pub line: usize,
    #[serde(flatten)]
    pub kind: ProblemKind,
}

impl FormatProblem {
    pub fn new(line: usize, kind: ProblemKind) -> Self {
        Self { line, kind }
    }
}

/// Errors produced by the metric functions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    #[error("sequences must not be empty")]
    EmptySequence,

    #[error("sequence lengths differ: {real} real vs {predicted} predicted")]
    LengthMismatch { real: usize, predicted: usize },

    #[error("division by zero: real value at index {index} is 0")]
    DivisionByZero { index: usize },

    #[error("label at index {index} is {value}, expected 0 or 1")]
    NonBinaryLabel { index: usize, value: f64 },

    #[error("metric result is not a finite number")]
    NonFinite,
}

/// Scorekeeper pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ScorekeeperError {
    #[error("malformed input: {} problem(s)", .problems.len())]
    MalformedInput { problems: Vec<FormatProblem> },

    #[error("cardinality mismatch: task expects {expected} answers, submission has {actual}")]
    CardinalityMismatch { expected: usize, actual: usize },

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task is not accepting submissions: {0}")]
    TaskInactive(TaskId),

    #[error("answer for question {question_id} is not a number: {value:?}")]
    NumericConversion { question_id: String, value: String },

    #[error("no answer submitted for question {question_id}")]
    MissingAnswer { question_id: String },

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("scoring attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("gave up after {attempts} scoring attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl ScorekeeperError {
    /// Whether a scoring attempt that failed with this error may succeed if
    /// run again with the same inputs.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScorekeeperError::Timeout(_) => true,
            ScorekeeperError::Persistence(e) => matches!(e, StorageError::Backend(_)),
            _ => false,
        }
    }

    /// Problems carried by a `MalformedInput` error, empty otherwise.
    pub fn problems(&self) -> &[FormatProblem] {
        match self {
            ScorekeeperError::MalformedInput { problems } => problems,
            _ => &[],
        }
    }
}

/// Result type for Scorekeeper domain operations.
pub type Result<T> = std::result::Result<T, ScorekeeperError>;
