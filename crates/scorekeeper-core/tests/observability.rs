//! Structured lifecycle events reach the tracing subscriber.

use std::sync::Arc;

use scorekeeper_core::{
    emit_score_recorded, emit_scoring_failed, emit_scoring_retry, emit_submission_rejected,
    NoopScheduler, ScoringConfig, ScoringWorker, SubmissionIngest,
};
use scorekeeper_state::fakes::{MemorySubmissionStore, MemoryTaskStore};
use scorekeeper_state::{AnswerMap, TaskRecord, TaskStore};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn emit_helpers_log_event_names() {
    emit_score_recorded("sub-1", 0.25, 1);
    emit_scoring_retry("sub-1", 1, &"connection reset");
    emit_scoring_failed("sub-2", "no answer submitted for question 3");
    emit_submission_rejected("t1", "alice", &"malformed input: 1 problem(s)");

    assert!(logs_contain("scoring.scored"));
    assert!(logs_contain("scoring.retry"));
    assert!(logs_contain("scoring.failed"));
    assert!(logs_contain("submission.rejected"));
}

#[traced_test]
#[tokio::test]
async fn pipeline_emits_lifecycle_events() {
    let tasks = Arc::new(MemoryTaskStore::new());
    let key: AnswerMap = [("1".to_string(), "1".to_string())].into_iter().collect();
    tasks
        .put_task(&TaskRecord::new("t1", "One", key, "mae"))
        .await
        .unwrap();
    let store = Arc::new(MemorySubmissionStore::new());
    let ingest = SubmissionIngest::new(tasks.clone(), store.clone(), Arc::new(NoopScheduler));
    let worker = ScoringWorker::new(tasks, store, ScoringConfig::default());

    let id = ingest
        .submit(&"t1".into(), &"alice".into(), b"id,result\n1,3\n")
        .await
        .unwrap();
    worker.process(&id).await;

    assert!(logs_contain("submission.accepted"));
    assert!(logs_contain("scoring.started"));
    assert!(logs_contain("scoring.scored"));
    assert!(logs_contain(id.as_str()));
}
