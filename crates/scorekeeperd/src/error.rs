//! HTTP mapping of pipeline errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scorekeeper_core::ScorekeeperError;
use scorekeeper_state::StorageError;
use serde_json::json;
use tracing::error;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// The caller identity header is absent or empty
    MissingIdentity,
    Pipeline(ScorekeeperError),
}

impl From<ScorekeeperError> for ApiError {
    fn from(err: ScorekeeperError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingIdentity => StatusCode::UNAUTHORIZED,
            ApiError::Pipeline(err) => match err {
                ScorekeeperError::MalformedInput { .. }
                | ScorekeeperError::CardinalityMismatch { .. } => StatusCode::BAD_REQUEST,
                ScorekeeperError::TaskNotFound(_)
                | ScorekeeperError::Persistence(StorageError::SubmissionNotFound { .. }) => {
                    StatusCode::NOT_FOUND
                }
                ScorekeeperError::TaskInactive(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::MissingIdentity => "missing_identity",
            ApiError::Pipeline(err) => match err {
                ScorekeeperError::MalformedInput { .. } => "malformed_input",
                ScorekeeperError::CardinalityMismatch { .. } => "cardinality_mismatch",
                ScorekeeperError::TaskNotFound(_) => "task_not_found",
                ScorekeeperError::TaskInactive(_) => "task_inactive",
                ScorekeeperError::Persistence(StorageError::SubmissionNotFound { .. }) => {
                    "submission_not_found"
                }
                _ => "internal",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = match self {
            ApiError::MissingIdentity => json!({
                "error": code,
                "message": "x-participant-id header is required",
            }),
            ApiError::Pipeline(err) if status.is_server_error() => {
                error!(error = %err, "request failed");
                json!({ "error": code, "message": "internal error" })
            }
            ApiError::Pipeline(err) => {
                let mut body = json!({ "error": code, "message": err.to_string() });
                match err {
                    ScorekeeperError::MalformedInput { problems } => {
                        body["problems"] = json!(problems);
                    }
                    ScorekeeperError::CardinalityMismatch { expected, actual } => {
                        body["expected"] = json!(expected);
                        body["actual"] = json!(actual);
                    }
                    _ => {}
                }
                body
            }
        };
        (status, Json(body)).into_response()
    }
}
