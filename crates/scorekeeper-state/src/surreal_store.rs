//! SurrealDB-backed store implementation
//!
//! Uses the rows in `schema` for persistence, converting to/from
//! `storage_traits` types at the boundary. Records are keyed by their
//! natural IDs so lookups are direct record fetches.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::handle::{self, StoreLocation};
use crate::schema::{ParticipantRow, SubmissionRow, TaskRow};
use crate::storage_traits::{
    NewSubmission, ParticipantDirectory, ParticipantId, ParticipantRecord, ScoreStatus,
    StorageResult, SubmissionId, SubmissionRecord, SubmissionStore, TaskId, TaskRecord, TaskStore,
};

const TASKS: &str = "tasks";
const SUBMISSIONS: &str = "submissions";
const PARTICIPANTS: &str = "participants";

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// SurrealDB-backed implementation of [`TaskStore`], [`SubmissionStore`]
/// and [`ParticipantDirectory`].
#[derive(Clone)]
pub struct SurrealScoreStore {
    db: Surreal<Any>,
}

impl SurrealScoreStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&StoreLocation::Memory).await
    }

    /// Create from environment variables (see [`StoreLocation::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        Self::connect(&StoreLocation::from_env()).await
    }

    /// Connect to an explicit location.
    pub async fn connect(location: &StoreLocation) -> crate::Result<Self> {
        let db = handle::connect(location).await?;
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    /// Fetch a submission row by ID, or SubmissionNotFound.
    async fn fetch_submission(&self, id: &SubmissionId) -> StorageResult<SubmissionRow> {
        let row: Option<SubmissionRow> = self
            .db
            .select((SUBMISSIONS, id.0.clone()))
            .await
            .map_err(backend)?;
        row.ok_or_else(|| StorageError::SubmissionNotFound {
            submission_id: id.0.clone(),
        })
    }

    /// Run a conditional update that only applies to pending submissions.
    ///
    /// The `status = 'pending'` guard lives in the WHERE clause so the check
    /// and the write are one statement. An empty result means the row is
    /// missing or no longer pending; the follow-up read tells which.
    async fn update_pending(
        &self,
        id: &SubmissionId,
        set_clause: &str,
        score: Option<f64>,
        reason: Option<String>,
    ) -> StorageResult<SubmissionRow> {
        let sql = format!(
            "UPDATE type::thing($tb, $sid) SET {set_clause} WHERE status = 'pending' RETURN AFTER"
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("tb", SUBMISSIONS))
            .bind(("sid", id.0.clone()))
            .bind(("score", score))
            .bind(("reason", reason))
            .await
            .map_err(backend)?;
        let rows: Vec<SubmissionRow> = res.take(0).map_err(backend)?;

        match rows.into_iter().next() {
            Some(row) => Ok(row),
            None => {
                let current = self.fetch_submission(id).await?;
                Err(StorageError::InvalidSubmissionState {
                    submission_id: id.0.clone(),
                    status: current.status,
                    expected: ScoreStatus::Pending.to_string(),
                })
            }
        }
    }

    fn rows_to_records(rows: Vec<SubmissionRow>) -> StorageResult<Vec<SubmissionRecord>> {
        rows.into_iter().map(SubmissionRecord::try_from).collect()
    }
}

#[async_trait]
impl TaskStore for SurrealScoreStore {
    #[instrument(skip(self, task), fields(task_id = %task.task_id))]
    async fn put_task(&self, task: &TaskRecord) -> StorageResult<()> {
        let _stored: Option<TaskRow> = self
            .db
            .upsert((TASKS, task.task_id.0.clone()))
            .content(TaskRow::from(task))
            .await
            .map_err(backend)?;
        debug!("task stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<TaskRecord>> {
        let row: Option<TaskRow> = self
            .db
            .select((TASKS, task_id.0.clone()))
            .await
            .map_err(backend)?;
        Ok(row.map(TaskRecord::from))
    }
}

#[async_trait]
impl SubmissionStore for SurrealScoreStore {
    #[instrument(skip(self, new), fields(task_id = %new.task_id, participant_id = %new.participant_id))]
    async fn create_submission(&self, new: NewSubmission) -> StorageResult<SubmissionRecord> {
        let record = SubmissionRecord::accepted(new);
        let created: Option<SubmissionRow> = self
            .db
            .create((SUBMISSIONS, record.submission_id.0.clone()))
            .content(SubmissionRow::from(&record))
            .await
            .map_err(backend)?;
        if created.is_none() {
            return Err(StorageError::Backend(format!(
                "create returned no row for submission {}",
                record.submission_id
            )));
        }
        debug!(submission_id = %record.submission_id, "submission created");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord> {
        SubmissionRecord::try_from(self.fetch_submission(id).await?)
    }

    #[instrument(skip(self))]
    async fn begin_attempt(&self, id: &SubmissionId) -> StorageResult<u32> {
        let row = self
            .update_pending(id, "attempts += 1", None, None)
            .await?;
        Ok(row.attempts)
    }

    #[instrument(skip(self))]
    async fn record_score(&self, id: &SubmissionId, score: f64) -> StorageResult<SubmissionRecord> {
        let row = self
            .update_pending(
                id,
                "status = 'scored', score = $score, scored_at = time::now()",
                Some(score),
                None,
            )
            .await?;
        SubmissionRecord::try_from(row)
    }

    #[instrument(skip(self))]
    async fn record_failure(
        &self,
        id: &SubmissionId,
        reason: &str,
    ) -> StorageResult<SubmissionRecord> {
        let row = self
            .update_pending(
                id,
                "status = 'failed', failure_reason = $reason, scored_at = time::now()",
                None,
                Some(reason.to_string()),
            )
            .await?;
        SubmissionRecord::try_from(row)
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: &SubmissionId, active: bool) -> StorageResult<()> {
        self.fetch_submission(id).await?;
        self.db
            .query("UPDATE type::thing($tb, $sid) SET is_active = $active")
            .bind(("tb", SUBMISSIONS))
            .bind(("sid", id.0.clone()))
            .bind(("active", active))
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pending(&self) -> StorageResult<Vec<SubmissionId>> {
        let mut res = self
            .db
            .query("SELECT * FROM submissions WHERE status = 'pending' ORDER BY submitted_at ASC")
            .await
            .map_err(backend)?;
        let rows: Vec<SubmissionRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().map(|r| SubmissionId(r.submission_id)).collect())
    }

    #[instrument(skip(self))]
    async fn list_scored(
        &self,
        task_id: &TaskId,
        participant_id: Option<&ParticipantId>,
    ) -> StorageResult<Vec<SubmissionRecord>> {
        let tid = task_id.0.clone();
        let rows: Vec<SubmissionRow> = if let Some(participant) = participant_id {
            let mut res = self
                .db
                .query(
                    "SELECT * FROM submissions \
                     WHERE task_id = $tid AND participant_id = $pid \
                     AND is_active = true AND status = 'scored' AND score != NONE \
                     ORDER BY submitted_at DESC",
                )
                .bind(("tid", tid))
                .bind(("pid", participant.0.clone()))
                .await
                .map_err(backend)?;
            res.take(0).map_err(backend)?
        } else {
            let mut res = self
                .db
                .query(
                    "SELECT * FROM submissions \
                     WHERE task_id = $tid AND is_active = true \
                     AND status = 'scored' AND score != NONE \
                     ORDER BY submitted_at DESC",
                )
                .bind(("tid", tid))
                .await
                .map_err(backend)?;
            res.take(0).map_err(backend)?
        };

        Self::rows_to_records(rows)
    }
}

#[async_trait]
impl ParticipantDirectory for SurrealScoreStore {
    #[instrument(skip(self, participant), fields(participant_id = %participant.participant_id))]
    async fn put_participant(&self, participant: &ParticipantRecord) -> StorageResult<()> {
        let _stored: Option<ParticipantRow> = self
            .db
            .upsert((PARTICIPANTS, participant.participant_id.0.clone()))
            .content(ParticipantRow::from(participant))
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_participant(
        &self,
        id: &ParticipantId,
    ) -> StorageResult<Option<ParticipantRecord>> {
        let row: Option<ParticipantRow> = self
            .db
            .select((PARTICIPANTS, id.0.clone()))
            .await
            .map_err(backend)?;
        Ok(row.map(ParticipantRecord::from))
    }
}
