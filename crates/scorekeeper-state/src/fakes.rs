//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryTaskStore`, `MemorySubmissionStore`, and
//! `MemoryParticipantDirectory` that satisfy the trait contracts without any
//! external dependencies.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

fn lock<T>(mutex: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StorageError::Backend(format!("poisoned lock: {e}")))
}

// ---------------------------------------------------------------------------
// MemoryTaskStore
// ---------------------------------------------------------------------------

/// In-memory task store backed by a `HashMap<task_id, TaskRecord>`.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn put_task(&self, task: &TaskRecord) -> StorageResult<()> {
        lock(&self.tasks)?.insert(task.task_id.0.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<TaskRecord>> {
        Ok(lock(&self.tasks)?.get(&task_id.0).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemorySubmissionStore
// ---------------------------------------------------------------------------

/// In-memory submission store.
///
/// Records are kept in insertion order so that equal timestamps still list
/// deterministically (later insert first).
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    submissions: Mutex<Vec<SubmissionRecord>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record as-is (for seeding fixtures with explicit
    /// timestamps and states).
    pub fn insert(&self, record: SubmissionRecord) -> StorageResult<()> {
        lock(&self.submissions)?.push(record);
        Ok(())
    }

    /// Number of stored submissions.
    pub fn len(&self) -> usize {
        self.submissions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_pending<F>(&self, id: &SubmissionId, apply: F) -> StorageResult<SubmissionRecord>
    where
        F: FnOnce(&mut SubmissionRecord),
    {
        let mut submissions = lock(&self.submissions)?;
        let record = submissions
            .iter_mut()
            .find(|s| s.submission_id == *id)
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: id.0.clone(),
            })?;
        if record.status != ScoreStatus::Pending {
            return Err(StorageError::InvalidSubmissionState {
                submission_id: id.0.clone(),
                status: record.status.to_string(),
                expected: ScoreStatus::Pending.to_string(),
            });
        }
        apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn create_submission(&self, new: NewSubmission) -> StorageResult<SubmissionRecord> {
        let record = SubmissionRecord::accepted(new);
        lock(&self.submissions)?.push(record.clone());
        Ok(record)
    }

    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord> {
        lock(&self.submissions)?
            .iter()
            .find(|s| s.submission_id == *id)
            .cloned()
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: id.0.clone(),
            })
    }

    async fn begin_attempt(&self, id: &SubmissionId) -> StorageResult<u32> {
        let record = self.with_pending(id, |s| s.attempts += 1)?;
        Ok(record.attempts)
    }

    async fn record_score(&self, id: &SubmissionId, score: f64) -> StorageResult<SubmissionRecord> {
        self.with_pending(id, |s| {
            s.status = ScoreStatus::Scored;
            s.score = Some(score);
            s.scored_at = Some(Utc::now());
        })
    }

    async fn record_failure(
        &self,
        id: &SubmissionId,
        reason: &str,
    ) -> StorageResult<SubmissionRecord> {
        self.with_pending(id, |s| {
            s.status = ScoreStatus::Failed;
            s.failure_reason = Some(reason.to_string());
            s.scored_at = Some(Utc::now());
        })
    }

    async fn set_active(&self, id: &SubmissionId, active: bool) -> StorageResult<()> {
        let mut submissions = lock(&self.submissions)?;
        let record = submissions
            .iter_mut()
            .find(|s| s.submission_id == *id)
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: id.0.clone(),
            })?;
        record.is_active = active;
        Ok(())
    }

    async fn list_pending(&self) -> StorageResult<Vec<SubmissionId>> {
        let submissions = lock(&self.submissions)?;
        let mut pending: Vec<&SubmissionRecord> = submissions
            .iter()
            .filter(|s| s.status == ScoreStatus::Pending)
            .collect();
        pending.sort_by_key(|s| s.submitted_at);
        Ok(pending.into_iter().map(|s| s.submission_id.clone()).collect())
    }

    async fn list_scored(
        &self,
        task_id: &TaskId,
        participant_id: Option<&ParticipantId>,
    ) -> StorageResult<Vec<SubmissionRecord>> {
        let submissions = lock(&self.submissions)?;
        let mut rows: Vec<SubmissionRecord> = submissions
            .iter()
            .rev()
            .filter(|s| s.task_id == *task_id && s.is_ranked())
            .filter(|s| participant_id.map(|p| s.participant_id == *p).unwrap_or(true))
            .cloned()
            .collect();
        // stable: equal timestamps keep later-insert-first
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// MemoryParticipantDirectory
// ---------------------------------------------------------------------------

/// In-memory participant directory backed by a `HashMap<id, ParticipantRecord>`.
#[derive(Debug, Default)]
pub struct MemoryParticipantDirectory {
    participants: Mutex<HashMap<String, ParticipantRecord>>,
}

impl MemoryParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParticipantDirectory for MemoryParticipantDirectory {
    async fn put_participant(&self, participant: &ParticipantRecord) -> StorageResult<()> {
        lock(&self.participants)?.insert(participant.participant_id.0.clone(), participant.clone());
        Ok(())
    }

    async fn get_participant(
        &self,
        id: &ParticipantId,
    ) -> StorageResult<Option<ParticipantRecord>> {
        Ok(lock(&self.participants)?.get(&id.0).cloned())
    }
}
