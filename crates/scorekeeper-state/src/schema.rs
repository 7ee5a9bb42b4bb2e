//! Row definitions for the Scorekeeper SurrealDB tables
//!
//! Tables:
//! - tasks: canonical answer keys and metric selectors
//! - submissions: participant answers and their scoring state
//! - participants: display attributes
//!
//! Rows are keyed by their natural ID (`tasks:<task_id>` etc.), so the
//! SurrealDB record `id` is not carried in the structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{
    AnswerMap, ContentDigest, ParticipantRecord, StorageResult, SubmissionRecord, TaskRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

/// Row in the `tasks` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub task_id: String,
    pub name: String,
    pub answer_key: AnswerMap,
    pub metric: String,
    pub is_active: bool,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<&TaskRecord> for TaskRow {
    fn from(task: &TaskRecord) -> Self {
        TaskRow {
            task_id: task.task_id.0.clone(),
            name: task.name.clone(),
            answer_key: task.answer_key.clone(),
            metric: task.metric.clone(),
            is_active: task.is_active,
            created_at: task.created_at,
        }
    }
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        TaskRecord {
            task_id: row.task_id.into(),
            name: row.name,
            answer_key: row.answer_key,
            metric: row.metric,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Row in the `submissions` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub submission_id: String,
    pub task_id: String,
    pub participant_id: String,
    pub answers: AnswerMap,
    pub content_digest: String,
    /// "pending" | "scored" | "failed"
    pub status: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub is_active: bool,
    #[serde(with = "surreal_datetime")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub scored_at: Option<DateTime<Utc>>,
}

impl From<&SubmissionRecord> for SubmissionRow {
    fn from(record: &SubmissionRecord) -> Self {
        SubmissionRow {
            submission_id: record.submission_id.0.clone(),
            task_id: record.task_id.0.clone(),
            participant_id: record.participant_id.0.clone(),
            answers: record.answers.clone(),
            content_digest: record.content_digest.as_str().to_string(),
            status: record.status.as_str().to_string(),
            score: record.score,
            failure_reason: record.failure_reason.clone(),
            attempts: record.attempts,
            is_active: record.is_active,
            submitted_at: record.submitted_at,
            scored_at: record.scored_at,
        }
    }
}

impl TryFrom<SubmissionRow> for SubmissionRecord {
    type Error = StorageError;

    fn try_from(row: SubmissionRow) -> StorageResult<Self> {
        Ok(SubmissionRecord {
            submission_id: row.submission_id.into(),
            task_id: row.task_id.into(),
            participant_id: row.participant_id.into(),
            answers: row.answers,
            content_digest: ContentDigest::try_from(row.content_digest)?,
            status: row.status.parse()?,
            score: row.score,
            failure_reason: row.failure_reason,
            attempts: row.attempts,
            is_active: row.is_active,
            submitted_at: row.submitted_at,
            scored_at: row.scored_at,
        })
    }
}

/// Row in the `participants` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub participant_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl From<&ParticipantRecord> for ParticipantRow {
    fn from(p: &ParticipantRecord) -> Self {
        ParticipantRow {
            participant_id: p.participant_id.0.clone(),
            display_name: p.display_name.clone(),
            avatar_url: p.avatar_url.clone(),
        }
    }
}

impl From<ParticipantRow> for ParticipantRecord {
    fn from(row: ParticipantRow) -> Self {
        ParticipantRecord {
            participant_id: row.participant_id.into(),
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_traits::{NewSubmission, ScoreStatus};

    fn sample_submission() -> SubmissionRecord {
        let mut answers = AnswerMap::new();
        answers.insert("1".to_string(), "3.5".to_string());
        SubmissionRecord::accepted(NewSubmission {
            task_id: "task-1".into(),
            participant_id: "alice".into(),
            answers,
            content_digest: ContentDigest::from_bytes(b"id,result\n1,3.5\n"),
        })
    }

    #[test]
    fn submission_row_serializes_status_as_text() {
        let row = SubmissionRow::from(&sample_submission());
        let json = serde_json::to_string(&row).expect("serialize");
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("task-1"));
    }

    #[test]
    fn submission_row_converts_back() {
        let record = sample_submission();
        let back = SubmissionRecord::try_from(SubmissionRow::from(&record)).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn submission_row_with_unknown_status_is_rejected() {
        let mut row = SubmissionRow::from(&sample_submission());
        row.status = "archived".to_string();
        assert!(SubmissionRecord::try_from(row).is_err());
    }

    #[test]
    fn scored_row_keeps_score() {
        let mut record = sample_submission();
        record.status = ScoreStatus::Scored;
        record.score = Some(0.25);
        let back = SubmissionRecord::try_from(SubmissionRow::from(&record)).unwrap();
        assert_eq!(back.score, Some(0.25));
        assert_eq!(back.status, ScoreStatus::Scored);
    }
}
