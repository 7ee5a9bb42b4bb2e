//! Scoring worker: turns one pending submission into a score or a failure.
//!
//! Each attempt re-reads the submission and its task, so a job can be run
//! any number of times. The store only accepts the first terminal write;
//! a losing job sees `InvalidSubmissionState` and reports `Skipped`.

use std::sync::Arc;

use scorekeeper_state::{ScoreStatus, StorageError, SubmissionId, SubmissionStore, TaskStore};
use tracing::{debug, warn, Instrument};

use super::config::ScoringConfig;
use crate::domain::{Result, ScorekeeperError, Task};
use crate::metrics::METRICS;
use crate::obs;

/// What happened to a submission when a job ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Score recorded by this job
    Scored(f64),
    /// Marked failed by this job, with the recorded reason
    Failed(String),
    /// Already terminal (another job or an earlier run finished it)
    Skipped(ScoreStatus),
    /// No submission with this id
    Missing,
    /// Could not record anything; the submission stays pending for recovery
    Deferred(String),
}

/// Scores submissions against their task's canonical key.
pub struct ScoringWorker {
    tasks: Arc<dyn TaskStore>,
    submissions: Arc<dyn SubmissionStore>,
    config: ScoringConfig,
}

impl ScoringWorker {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        submissions: Arc<dyn SubmissionStore>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            tasks,
            submissions,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub(crate) fn submissions(&self) -> Arc<dyn SubmissionStore> {
        Arc::clone(&self.submissions)
    }

    /// Run one job to completion: attempts, retries and the terminal write.
    ///
    /// Never returns an error; every path ends in a [`ScoreOutcome`].
    pub async fn process(&self, id: &SubmissionId) -> ScoreOutcome {
        self.run(id)
            .instrument(obs::submission_span(id.as_str()))
            .await
    }

    async fn run(&self, id: &SubmissionId) -> ScoreOutcome {
        let mut retries = 0u32;
        loop {
            let mut attempts = 0u32;
            let result = match tokio::time::timeout(
                self.config.attempt_timeout,
                self.attempt(id, &mut attempts),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ScorekeeperError::Timeout(self.config.attempt_timeout)),
            };

            let error = match result {
                Ok(outcome) => return outcome,
                Err(error) => error,
            };

            // The store count survives restarts; the local one covers
            // attempts that never reached the store.
            let used = attempts.max(retries + 1);
            if error.is_retryable() && used < self.config.max_attempts {
                retries += 1;
                METRICS.inc_retries();
                obs::emit_scoring_retry(id.as_str(), used, &error);
                tokio::time::sleep(self.config.backoff_for(retries)).await;
                continue;
            }

            return self.fail(id, &error).await;
        }
    }

    /// One scoring attempt. `attempts` receives the store's attempt count
    /// once the attempt has been registered.
    async fn attempt(&self, id: &SubmissionId, attempts: &mut u32) -> Result<ScoreOutcome> {
        let submission = match self.submissions.get_submission(id).await {
            Ok(submission) => submission,
            Err(StorageError::SubmissionNotFound { .. }) => return Ok(ScoreOutcome::Missing),
            Err(e) => return Err(e.into()),
        };
        if submission.status.is_terminal() {
            debug!(status = %submission.status, "submission already terminal");
            return Ok(ScoreOutcome::Skipped(submission.status));
        }
        if submission.attempts >= self.config.max_attempts {
            return Err(ScorekeeperError::AttemptsExhausted {
                attempts: submission.attempts,
            });
        }

        *attempts = match self.submissions.begin_attempt(id).await {
            Ok(n) => n,
            Err(StorageError::InvalidSubmissionState { status, .. }) => {
                return Ok(skipped(&status))
            }
            Err(e) => return Err(e.into()),
        };
        obs::emit_scoring_started(id.as_str(), *attempts);

        let record = self
            .tasks
            .get_task(&submission.task_id)
            .await?
            .ok_or_else(|| ScorekeeperError::TaskNotFound(submission.task_id.clone()))?;
        let task = Task::try_from(record)?;
        let score = task.score(&submission.answers)?;

        match self.submissions.record_score(id, score).await {
            Ok(_) => {
                METRICS.inc_scored();
                obs::emit_score_recorded(id.as_str(), score, *attempts);
                Ok(ScoreOutcome::Scored(score))
            }
            Err(StorageError::InvalidSubmissionState { status, .. }) => Ok(skipped(&status)),
            Err(e) => Err(e.into()),
        }
    }

    async fn fail(&self, id: &SubmissionId, error: &ScorekeeperError) -> ScoreOutcome {
        let reason = error.to_string();
        match self.submissions.record_failure(id, &reason).await {
            Ok(_) => {
                METRICS.inc_failures();
                obs::emit_scoring_failed(id.as_str(), &reason);
                ScoreOutcome::Failed(reason)
            }
            Err(StorageError::InvalidSubmissionState { status, .. }) => skipped(&status),
            Err(StorageError::SubmissionNotFound { .. }) => ScoreOutcome::Missing,
            Err(e) => {
                warn!(error = %e, reason = %reason, "could not record scoring failure; left pending");
                ScoreOutcome::Deferred(reason)
            }
        }
    }
}

fn skipped(status: &str) -> ScoreOutcome {
    ScoreOutcome::Skipped(status.parse().unwrap_or(ScoreStatus::Scored))
}
