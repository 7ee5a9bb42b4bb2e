//! Route handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use scorekeeper_core::{HistoryEntry, ScoreStatus, ScoreboardEntry, VERSION};
use scorekeeper_state::{ParticipantId, SubmissionId, TaskId};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the caller's participant id.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

fn caller(headers: &HeaderMap) -> Result<ParticipantId, ApiError> {
    headers
        .get(PARTICIPANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ParticipantId::from)
        .ok_or(ApiError::MissingIdentity)
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub answer_id: SubmissionId,
}

/// `POST /answers/{task_id}`
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let participant = caller(&headers)?;
    let answer_id = state
        .ingest
        .submit(&TaskId::from(task_id), &participant, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(SubmitResponse { answer_id })))
}

/// `GET /answers/{task_id}/all`
pub async fn ranking(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Vec<ScoreboardEntry>>, ApiError> {
    Ok(Json(state.scoreboard.ranking(&TaskId::from(task_id)).await?))
}

/// `GET /answers/{task_id}`: the caller's own scored submissions.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let participant = caller(&headers)?;
    Ok(Json(
        state
            .scoreboard
            .history(&TaskId::from(task_id), &participant)
            .await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct SubmissionStatus {
    pub submission_id: SubmissionId,
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
    pub status: ScoreStatus,
    pub score: Option<f64>,
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub scored_at: Option<DateTime<Utc>>,
}

/// `GET /submissions/{submission_id}`
pub async fn submission_status(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmissionStatus>, ApiError> {
    let record = state
        .submissions
        .get_submission(&SubmissionId::from(submission_id))
        .await
        .map_err(scorekeeper_core::ScorekeeperError::from)?;
    Ok(Json(SubmissionStatus {
        submission_id: record.submission_id,
        task_id: record.task_id,
        participant_id: record.participant_id,
        status: record.status,
        score: record.score,
        failure_reason: record.failure_reason,
        attempts: record.attempts,
        submitted_at: record.submitted_at,
        scored_at: record.scored_at,
    }))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}
