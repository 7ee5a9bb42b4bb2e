//! Error types for scorekeeper-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the store traits.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No submission with this ID exists
    #[error("submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: String },

    /// The submission is not in the state the operation requires
    #[error("submission {submission_id} is {status}, expected {expected}")]
    InvalidSubmissionState {
        submission_id: String,
        status: String,
        expected: String,
    },

    /// A digest string is not 64 hex characters
    #[error("invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    /// Opaque backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
