//! Storage trait definitions for Scorekeeper
//!
//! These traits define the persistence seams of the scoring pipeline:
//! - `TaskStore`: read access to tasks and their canonical answer keys
//! - `SubmissionStore`: submission persistence and the scoring state machine
//! - `ParticipantDirectory`: participant display attributes
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Question-id → raw value mapping, used for both answer keys and submissions.
pub type AnswerMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a task (owned by the task-management collaborator)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

/// Identifier of a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

/// Unique identifier of a submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    /// Generate a new random SubmissionId
    pub fn new() -> Self {
        SubmissionId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                $ty(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                $ty(s)
            }
        }
    };
}

string_id!(TaskId);
string_id!(ParticipantId);
string_id!(SubmissionId);

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// SHA-256 hex digest of an uploaded submission file.
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// A task with its canonical answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    /// Human-readable task name
    pub name: String,
    /// Canonical answer key: question-id → expected value
    pub answer_key: AnswerMap,
    /// Scoring-function identifier (e.g. "mse"); parsed by the core
    pub metric: String,
    /// Inactive tasks do not accept submissions
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Build an active task created now.
    pub fn new(
        task_id: impl Into<TaskId>,
        name: impl Into<String>,
        answer_key: AnswerMap,
        metric: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            answer_key,
            metric: metric.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Read access to tasks.
///
/// `put_task` exists so that the task-management collaborator (or a test,
/// or the CLI) can seed tasks; the pipeline itself only reads.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace a task.
    async fn put_task(&self, task: &TaskRecord) -> StorageResult<()>;

    /// Fetch a task by ID. Returns `None` if absent.
    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<TaskRecord>>;
}

// ---------------------------------------------------------------------------
// SubmissionStore
// ---------------------------------------------------------------------------

/// Scoring status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    /// Accepted, waiting for the scoring worker
    Pending,
    /// Score recorded (terminal)
    Scored,
    /// Scoring failed permanently (terminal)
    Failed,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreStatus::Pending => "pending",
            ScoreStatus::Scored => "scored",
            ScoreStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScoreStatus::Pending)
    }
}

impl std::fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScoreStatus::Pending),
            "scored" => Ok(ScoreStatus::Scored),
            "failed" => Ok(ScoreStatus::Failed),
            other => Err(StorageError::Backend(format!("unknown score status: {other}"))),
        }
    }
}

/// Everything ingest knows about a submission before it is persisted
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
    pub answers: AnswerMap,
    pub content_digest: ContentDigest,
}

/// Full submission record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission_id: SubmissionId,
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
    pub answers: AnswerMap,
    pub content_digest: ContentDigest,
    pub status: ScoreStatus,
    /// `None` until scored; never overwritten once set
    pub score: Option<f64>,
    pub failure_reason: Option<String>,
    /// Scoring attempts started so far
    pub attempts: u32,
    /// Soft-delete flag
    pub is_active: bool,
    pub submitted_at: DateTime<Utc>,
    pub scored_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    /// A freshly accepted submission: pending, unscored, active.
    pub fn accepted(new: NewSubmission) -> Self {
        Self {
            submission_id: SubmissionId::new(),
            task_id: new.task_id,
            participant_id: new.participant_id,
            answers: new.answers,
            content_digest: new.content_digest,
            status: ScoreStatus::Pending,
            score: None,
            failure_reason: None,
            attempts: 0,
            is_active: true,
            submitted_at: Utc::now(),
            scored_at: None,
        }
    }

    /// Whether this submission takes part in rankings and history.
    pub fn is_ranked(&self) -> bool {
        self.is_active && self.status == ScoreStatus::Scored && self.score.is_some()
    }
}

/// Submission persistence.
///
/// Guarantees:
/// - A submission transitions: Pending → Scored | Failed (terminal).
/// - `record_score` / `record_failure` on a non-pending submission fail with
///   `StorageError::InvalidSubmissionState` and change nothing, so a score is
///   written at most once even if a scoring job runs twice.
/// - Submissions are never deleted; `set_active(false)` hides them.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a new pending submission and return the stored record.
    async fn create_submission(&self, new: NewSubmission) -> StorageResult<SubmissionRecord>;

    /// Retrieve a submission by ID. Returns `SubmissionNotFound` if absent.
    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord>;

    /// Count a scoring attempt on a pending submission, returning the new total.
    async fn begin_attempt(&self, id: &SubmissionId) -> StorageResult<u32>;

    /// Pending → Scored with the given score.
    async fn record_score(&self, id: &SubmissionId, score: f64) -> StorageResult<SubmissionRecord>;

    /// Pending → Failed with a reason.
    async fn record_failure(
        &self,
        id: &SubmissionId,
        reason: &str,
    ) -> StorageResult<SubmissionRecord>;

    /// Toggle the soft-delete flag.
    async fn set_active(&self, id: &SubmissionId, active: bool) -> StorageResult<()>;

    /// IDs of all pending submissions, oldest first.
    async fn list_pending(&self) -> StorageResult<Vec<SubmissionId>>;

    /// Active, scored submissions for a task (optionally one participant's),
    /// newest first.
    async fn list_scored(
        &self,
        task_id: &TaskId,
        participant_id: Option<&ParticipantId>,
    ) -> StorageResult<Vec<SubmissionRecord>>;
}

// ---------------------------------------------------------------------------
// ParticipantDirectory
// ---------------------------------------------------------------------------

/// Display attributes of a participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Participant identity resolution.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Insert or replace a participant.
    async fn put_participant(&self, participant: &ParticipantRecord) -> StorageResult<()>;

    /// Look up a participant. Returns `None` if unknown.
    async fn get_participant(&self, id: &ParticipantId)
        -> StorageResult<Option<ParticipantRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_rejects_short_strings() {
        let err = ContentDigest::try_from("abc".to_string()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDigest { .. }));
    }

    #[test]
    fn digest_normalises_case() {
        let upper = "A".repeat(64);
        let digest = ContentDigest::try_from(upper).unwrap();
        assert_eq!(digest.as_str(), "a".repeat(64));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [ScoreStatus::Pending, ScoreStatus::Scored, ScoreStatus::Failed] {
            assert_eq!(status.as_str().parse::<ScoreStatus>().unwrap(), status);
        }
        assert!("done".parse::<ScoreStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ScoreStatus::Scored).unwrap();
        assert_eq!(json, "\"scored\"");
    }

    #[test]
    fn accepted_submission_is_pending_and_unranked() {
        let record = SubmissionRecord::accepted(NewSubmission {
            task_id: "t1".into(),
            participant_id: "p1".into(),
            answers: AnswerMap::new(),
            content_digest: ContentDigest::from_bytes(b"id,result\n"),
        });
        assert_eq!(record.status, ScoreStatus::Pending);
        assert_eq!(record.score, None);
        assert_eq!(record.attempts, 0);
        assert!(record.is_active);
        assert!(!record.is_ranked());
    }
}
