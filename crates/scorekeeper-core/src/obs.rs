//! Structured observability hooks for the submission lifecycle.
//!
//! This module provides:
//! - Submission-scoped tracing spans via `submission_span`
//! - Emission functions for lifecycle events: accepted, rejected, scoring
//!   started, scored, retried and failed
//!
//! Every event carries an `event` field so log pipelines can filter on it.

use tracing::{info, warn};

/// Span tagging everything inside it with a submission id.
///
/// Attach it to futures with `tracing::Instrument`; an entered guard must
/// not be held across `.await`.
pub fn submission_span(submission_id: &str) -> tracing::Span {
    tracing::info_span!("scorekeeper.submission", submission_id = %submission_id)
}

/// Emit event: a submission passed ingest and is pending.
pub fn emit_submission_accepted(submission_id: &str, task_id: &str, participant_id: &str) {
    info!(
        event = "submission.accepted",
        submission_id = %submission_id,
        task_id = %task_id,
        participant_id = %participant_id,
    );
}

/// Emit event: ingest rejected a submission.
pub fn emit_submission_rejected(task_id: &str, participant_id: &str, reason: &dyn std::fmt::Display) {
    info!(
        event = "submission.rejected",
        task_id = %task_id,
        participant_id = %participant_id,
        reason = %reason,
    );
}

/// Emit event: a scoring attempt started.
pub fn emit_scoring_started(submission_id: &str, attempt: u32) {
    info!(event = "scoring.started", submission_id = %submission_id, attempt = attempt);
}

/// Emit event: a score was recorded.
pub fn emit_score_recorded(submission_id: &str, score: f64, attempts: u32) {
    info!(
        event = "scoring.scored",
        submission_id = %submission_id,
        score = score,
        attempts = attempts,
    );
}

/// Emit event: a transient scoring error will be retried.
pub fn emit_scoring_retry(submission_id: &str, attempt: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "scoring.retry",
        submission_id = %submission_id,
        attempt = attempt,
        error = %error,
    );
}

/// Emit event: the submission was marked failed (warning level).
pub fn emit_scoring_failed(submission_id: &str, reason: &str) {
    warn!(event = "scoring.failed", submission_id = %submission_id, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_span_enters() {
        let _entered = submission_span("test-submission").entered();
        emit_scoring_started("test-submission", 1);
    }
}
