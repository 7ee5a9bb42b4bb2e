//! Scorekeeper daemon: the HTTP surface over the submission pipeline.
//!
//! Routes:
//! - `POST /answers/{task_id}`: upload a submission file
//! - `GET /answers/{task_id}/all`: ranked best scores
//! - `GET /answers/{task_id}`: the caller's scored history
//! - `GET /submissions/{submission_id}`: scoring status of one submission
//! - `GET /health`
//!
//! The caller is identified by the `x-participant-id` header. Verifying that
//! header is left to whatever sits in front of the daemon.

pub mod api;
pub mod error;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use scorekeeper_core::{Scoreboard, ScoreScheduler, SubmissionIngest};
use scorekeeper_state::{ParticipantDirectory, SubmissionStore, TaskStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use api::PARTICIPANT_HEADER;

/// Shared handler state.
pub struct AppState {
    pub ingest: SubmissionIngest,
    pub scoreboard: Scoreboard,
    pub submissions: Arc<dyn SubmissionStore>,
}

impl AppState {
    /// Wire ingest and the scoreboard to one store implementing every trait.
    pub fn new<S>(store: Arc<S>, scheduler: Arc<dyn ScoreScheduler>) -> Self
    where
        S: TaskStore + SubmissionStore + ParticipantDirectory + 'static,
    {
        Self {
            ingest: SubmissionIngest::new(store.clone(), store.clone(), scheduler),
            scoreboard: Scoreboard::new(store.clone(), store.clone()),
            submissions: store,
        }
    }
}

/// Build the router with tracing and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/answers/{task_id}", post(api::submit).get(api::history))
        .route("/answers/{task_id}/all", get(api::ranking))
        .route("/submissions/{submission_id}", get(api::submission_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
