//! Submission ingest: acceptance, every rejection path, and scheduling.

use std::sync::{Arc, Mutex};

use scorekeeper_core::{
    ProblemKind, ScheduleError, ScoreScheduler, ScorekeeperError, SubmissionIngest,
};
use scorekeeper_state::fakes::{MemorySubmissionStore, MemoryTaskStore};
use scorekeeper_state::{
    AnswerMap, ContentDigest, ScoreStatus, SubmissionId, SubmissionStore, TaskRecord, TaskStore,
};

/// Scheduler that remembers what it was given.
#[derive(Default)]
struct RecordingScheduler {
    scheduled: Mutex<Vec<SubmissionId>>,
}

impl ScoreScheduler for RecordingScheduler {
    fn schedule(&self, id: SubmissionId) -> Result<(), ScheduleError> {
        self.scheduled.lock().unwrap().push(id);
        Ok(())
    }
}

struct ClosedScheduler;

impl ScoreScheduler for ClosedScheduler {
    fn schedule(&self, _id: SubmissionId) -> Result<(), ScheduleError> {
        Err(ScheduleError::Closed)
    }
}

fn key(n: usize) -> AnswerMap {
    (1..=n).map(|i| (i.to_string(), format!("{i}.0"))).collect()
}

struct Fixture {
    tasks: Arc<MemoryTaskStore>,
    store: Arc<MemorySubmissionStore>,
    scheduler: Arc<RecordingScheduler>,
    ingest: SubmissionIngest,
}

async fn fixture() -> Fixture {
    let tasks = Arc::new(MemoryTaskStore::new());
    tasks
        .put_task(&TaskRecord::new("t1", "Three answers", key(3), "mse"))
        .await
        .unwrap();
    let store = Arc::new(MemorySubmissionStore::new());
    let scheduler = Arc::new(RecordingScheduler::default());
    let ingest = SubmissionIngest::new(tasks.clone(), store.clone(), scheduler.clone());
    Fixture {
        tasks,
        store,
        scheduler,
        ingest,
    }
}

const VALID: &[u8] = b"id,result\n1,1.5\n2,2.0\n3,2.5\n";

#[tokio::test]
async fn valid_submission_is_stored_pending_and_scheduled() {
    let f = fixture().await;
    let id = f
        .ingest
        .submit(&"t1".into(), &"alice".into(), VALID)
        .await
        .unwrap();

    let record = f.store.get_submission(&id).await.unwrap();
    assert_eq!(record.status, ScoreStatus::Pending);
    assert_eq!(record.score, None);
    assert!(record.is_active);
    assert_eq!(record.participant_id.as_str(), "alice");
    assert_eq!(record.answers["2"], "2.0");
    assert_eq!(record.content_digest, ContentDigest::from_bytes(VALID));
    assert_eq!(*f.scheduler.scheduled.lock().unwrap(), vec![id]);
}

#[tokio::test]
async fn wrong_header_is_rejected_and_nothing_stored() {
    let f = fixture().await;
    let err = f
        .ingest
        .submit(&"t1".into(), &"alice".into(), b"id,answer\n1,1\n2,2\n3,3\n")
        .await
        .unwrap_err();
    let problems = err.problems();
    assert_eq!(problems.len(), 1);
    assert!(matches!(problems[0].kind, ProblemKind::HeaderMismatch { .. }));
    assert!(f.store.is_empty());
    assert!(f.scheduler.scheduled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn row_count_mismatch_is_rejected() {
    let f = fixture().await;
    let err = f
        .ingest
        .submit(&"t1".into(), &"alice".into(), b"id,result\n1,1\n2,2\n")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScorekeeperError::CardinalityMismatch {
            expected: 3,
            actual: 2
        }
    ));
    assert!(f.store.is_empty());
}

#[tokio::test]
async fn duplicate_ids_collapse_before_cardinality_check() {
    let f = fixture().await;
    // four rows, three distinct ids: accepted, later value wins
    let id = f
        .ingest
        .submit(
            &"t1".into(),
            &"alice".into(),
            b"id,result\n1,1\n2,2\n3,3\n1,7\n",
        )
        .await
        .unwrap();
    let record = f.store.get_submission(&id).await.unwrap();
    assert_eq!(record.answers.len(), 3);
    assert_eq!(record.answers["1"], "7");

    // three rows, two distinct ids: rejected
    let err = f
        .ingest
        .submit(&"t1".into(), &"alice".into(), b"id,result\n1,1\n2,2\n2,3\n")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScorekeeperError::CardinalityMismatch {
            expected: 3,
            actual: 2
        }
    ));
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let f = fixture().await;
    let err = f
        .ingest
        .submit(&"missing".into(), &"alice".into(), VALID)
        .await
        .unwrap_err();
    assert!(matches!(err, ScorekeeperError::TaskNotFound(id) if id.as_str() == "missing"));
}

#[tokio::test]
async fn inactive_task_rejects_submissions() {
    let f = fixture().await;
    let mut closed = TaskRecord::new("closed", "Closed", key(3), "mse");
    closed.is_active = false;
    f.tasks.put_task(&closed).await.unwrap();

    let err = f
        .ingest
        .submit(&"closed".into(), &"alice".into(), VALID)
        .await
        .unwrap_err();
    assert!(matches!(err, ScorekeeperError::TaskInactive(_)));
    assert!(f.store.is_empty());
}

#[tokio::test]
async fn malformed_input_wins_over_missing_task() {
    let f = fixture().await;
    let err = f
        .ingest
        .submit(&"missing".into(), &"alice".into(), b"bogus\n")
        .await
        .unwrap_err();
    assert!(matches!(err, ScorekeeperError::MalformedInput { .. }));
}

#[tokio::test]
async fn non_utf8_upload_is_malformed() {
    let f = fixture().await;
    let err = f
        .ingest
        .submit(&"t1".into(), &"alice".into(), b"id,result\n1,\xfe\n")
        .await
        .unwrap_err();
    assert!(matches!(
        err.problems()[0].kind,
        ProblemKind::Encoding { .. }
    ));
}

#[tokio::test]
async fn every_format_problem_is_reported() {
    let f = fixture().await;
    let err = f
        .ingest
        .submit(&"t1".into(), &"alice".into(), b"id,result\n1\n2,\n3,3,3\n")
        .await
        .unwrap_err();
    let lines: Vec<usize> = err.problems().iter().map(|p| p.line).collect();
    assert_eq!(lines, vec![2, 3, 4]);
}

#[tokio::test]
async fn scheduling_failure_still_accepts_submission() {
    let tasks = Arc::new(MemoryTaskStore::new());
    tasks
        .put_task(&TaskRecord::new("t1", "Three answers", key(3), "mse"))
        .await
        .unwrap();
    let store = Arc::new(MemorySubmissionStore::new());
    let ingest = SubmissionIngest::new(tasks, store.clone(), Arc::new(ClosedScheduler));

    let id = ingest
        .submit(&"t1".into(), &"alice".into(), VALID)
        .await
        .unwrap();
    assert_eq!(store.list_pending().await.unwrap(), vec![id]);
}
