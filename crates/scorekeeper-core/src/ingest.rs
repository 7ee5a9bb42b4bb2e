//! Submission ingest: validate, check against the task, persist, schedule.
//!
//! Ingest is all-or-nothing. Every rejection happens before the store is
//! written, so a rejected upload leaves no trace besides a log event.

use std::sync::Arc;

use scorekeeper_state::{
    AnswerMap, ContentDigest, NewSubmission, ParticipantId, SubmissionId, SubmissionStore, TaskId,
    TaskStore,
};
use tracing::warn;

use crate::domain::{Record, Result, ScorekeeperError, SubmissionFormat};
use crate::metrics::METRICS;
use crate::obs;
use crate::scoring::ScoreScheduler;

/// Accepts raw submission files on behalf of participants.
pub struct SubmissionIngest {
    tasks: Arc<dyn TaskStore>,
    submissions: Arc<dyn SubmissionStore>,
    scheduler: Arc<dyn ScoreScheduler>,
    format: SubmissionFormat,
}

impl SubmissionIngest {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        submissions: Arc<dyn SubmissionStore>,
        scheduler: Arc<dyn ScoreScheduler>,
    ) -> Self {
        Self {
            tasks,
            submissions,
            scheduler,
            format: SubmissionFormat::answers(),
        }
    }

    /// Validate and store a submission, then schedule it for scoring.
    ///
    /// Returns the new submission id; the submission is `pending` until the
    /// scoring worker picks it up.
    ///
    /// # Errors
    ///
    /// - `MalformedInput`: the file failed format validation.
    /// - `TaskNotFound` / `TaskInactive`: the task cannot take submissions.
    /// - `CardinalityMismatch`: distinct answer count differs from the key's.
    /// - `Persistence`: the store failed.
    pub async fn submit(
        &self,
        task_id: &TaskId,
        participant_id: &ParticipantId,
        content: &[u8],
    ) -> Result<SubmissionId> {
        match self.accept(task_id, participant_id, content).await {
            Ok(id) => {
                METRICS.inc_accepted();
                obs::emit_submission_accepted(id.as_str(), task_id.as_str(), participant_id.as_str());
                Ok(id)
            }
            Err(e) => {
                METRICS.inc_rejected();
                obs::emit_submission_rejected(task_id.as_str(), participant_id.as_str(), &e);
                Err(e)
            }
        }
    }

    async fn accept(
        &self,
        task_id: &TaskId,
        participant_id: &ParticipantId,
        content: &[u8],
    ) -> Result<SubmissionId> {
        let records = self
            .format
            .validate_bytes(content)
            .map_err(|problems| ScorekeeperError::MalformedInput { problems })?;
        let answers = answer_map(&records);

        let task = self
            .tasks
            .get_task(task_id)
            .await?
            .ok_or_else(|| ScorekeeperError::TaskNotFound(task_id.clone()))?;
        if !task.is_active {
            return Err(ScorekeeperError::TaskInactive(task_id.clone()));
        }
        if answers.len() != task.answer_key.len() {
            return Err(ScorekeeperError::CardinalityMismatch {
                expected: task.answer_key.len(),
                actual: answers.len(),
            });
        }

        let record = self
            .submissions
            .create_submission(NewSubmission {
                task_id: task_id.clone(),
                participant_id: participant_id.clone(),
                answers,
                content_digest: ContentDigest::from_bytes(content),
            })
            .await?;

        let id = record.submission_id;
        if let Err(e) = self.scheduler.schedule(id.clone()) {
            warn!(submission_id = %id, error = %e, "scoring not scheduled; left pending for the next sweep");
        }
        Ok(id)
    }
}

/// Build a question-id → value map from validated `id,result` records.
///
/// Both fields are trimmed. When an id repeats, the later row wins.
pub fn answer_map(records: &[Record]) -> AnswerMap {
    let mut answers = AnswerMap::new();
    for record in records {
        if let [id, result] = record.fields.as_slice() {
            answers.insert(id.trim().to_string(), result.trim().to_string());
        }
    }
    answers
}
