//! Scorekeeper-State: persistence layer for the scoring pipeline
//!
//! This crate owns every byte that reaches the database. The scoring core
//! talks to it only through the async traits in [`storage_traits`], so the
//! same pipeline runs against the in-memory [`fakes`] in tests and against
//! SurrealDB in the daemon and CLI.
//!
//! ## Key Components
//!
//! - `TaskStore`: canonical answer keys and metric selectors
//! - `SubmissionStore`: submissions and the pending → scored | failed state machine
//! - `ParticipantDirectory`: participant display attributes
//! - `SurrealScoreStore`: SurrealDB implementation of all three

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::{CloudConfig, StoreLocation, DEFAULT_LOCAL_PATH};
pub use schema::{ParticipantRow, SubmissionRow, TaskRow};
pub use storage_traits::{
    AnswerMap, ContentDigest, NewSubmission, ParticipantDirectory, ParticipantId,
    ParticipantRecord, ScoreStatus, StorageResult, SubmissionId, SubmissionRecord,
    SubmissionStore, TaskId, TaskRecord, TaskStore,
};
pub use surreal_store::SurrealScoreStore;

/// Result type for scorekeeper-state connection operations
pub type Result<T> = std::result::Result<T, StateError>;
