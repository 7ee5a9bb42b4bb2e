//! Deferred scoring: queue, worker retries and timeouts, pending recovery.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scorekeeper_core::{
    NoopScheduler, ScoreOutcome, ScoringConfig, ScoringQueue, ScoringWorker, SubmissionIngest,
};
use scorekeeper_state::fakes::{MemorySubmissionStore, MemoryTaskStore};
use scorekeeper_state::{
    AnswerMap, NewSubmission, ScoreStatus, StorageError, StorageResult, SubmissionId,
    SubmissionRecord, SubmissionStore, TaskId, TaskRecord, TaskStore, ParticipantId,
};

fn map(pairs: &[(&str, &str)]) -> AnswerMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn fast_config() -> ScoringConfig {
    ScoringConfig {
        max_concurrency: 4,
        queue_capacity: 8,
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(500),
        retry_backoff: Duration::from_millis(5),
        recovery_interval: Duration::from_millis(50),
    }
}

async fn task_store() -> Arc<MemoryTaskStore> {
    let tasks = Arc::new(MemoryTaskStore::new());
    tasks
        .put_task(&TaskRecord::new(
            "t1",
            "Two answers",
            map(&[("a", "2"), ("b", "4")]),
            "mae",
        ))
        .await
        .unwrap();
    tasks
}

async fn wait_terminal(store: &dyn SubmissionStore, id: &SubmissionId) -> SubmissionRecord {
    for _ in 0..200 {
        let record = store.get_submission(id).await.unwrap();
        if record.status.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("submission {id} never left pending");
}

/// Submission store whose terminal writes fail a fixed number of times.
struct FlakyStore {
    inner: MemorySubmissionStore,
    failures_left: AtomicU32,
    failure_writes_left: AtomicU32,
}

impl FlakyStore {
    /// `record_score` fails `failures` times.
    fn new(failures: u32) -> Self {
        Self {
            inner: MemorySubmissionStore::new(),
            failures_left: AtomicU32::new(failures),
            failure_writes_left: AtomicU32::new(0),
        }
    }

    /// `record_failure` fails `failures` times.
    fn failing_failure_writes(failures: u32) -> Self {
        Self {
            inner: MemorySubmissionStore::new(),
            failures_left: AtomicU32::new(0),
            failure_writes_left: AtomicU32::new(failures),
        }
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl SubmissionStore for FlakyStore {
    async fn create_submission(&self, new: NewSubmission) -> StorageResult<SubmissionRecord> {
        self.inner.create_submission(new).await
    }
    async fn get_submission(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord> {
        self.inner.get_submission(id).await
    }
    async fn begin_attempt(&self, id: &SubmissionId) -> StorageResult<u32> {
        self.inner.begin_attempt(id).await
    }
    async fn record_score(&self, id: &SubmissionId, score: f64) -> StorageResult<SubmissionRecord> {
        if take_failure(&self.failures_left) {
            return Err(StorageError::Backend("connection reset".into()));
        }
        self.inner.record_score(id, score).await
    }
    async fn record_failure(&self, id: &SubmissionId, reason: &str) -> StorageResult<SubmissionRecord> {
        if take_failure(&self.failure_writes_left) {
            return Err(StorageError::Backend("connection reset".into()));
        }
        self.inner.record_failure(id, reason).await
    }
    async fn set_active(&self, id: &SubmissionId, active: bool) -> StorageResult<()> {
        self.inner.set_active(id, active).await
    }
    async fn list_pending(&self) -> StorageResult<Vec<SubmissionId>> {
        self.inner.list_pending().await
    }
    async fn list_scored(
        &self,
        task_id: &TaskId,
        participant_id: Option<&ParticipantId>,
    ) -> StorageResult<Vec<SubmissionRecord>> {
        self.inner.list_scored(task_id, participant_id).await
    }
}

/// Task store that never answers in time.
struct SlowTaskStore;

#[async_trait]
impl TaskStore for SlowTaskStore {
    async fn put_task(&self, _task: &TaskRecord) -> StorageResult<()> {
        Ok(())
    }
    async fn get_task(&self, _task_id: &TaskId) -> StorageResult<Option<TaskRecord>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }
}

/// Task store that answers after a fixed delay.
struct DelayedTaskStore {
    inner: Arc<MemoryTaskStore>,
    delay: Duration,
}

#[async_trait]
impl TaskStore for DelayedTaskStore {
    async fn put_task(&self, task: &TaskRecord) -> StorageResult<()> {
        self.inner.put_task(task).await
    }
    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<TaskRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_task(task_id).await
    }
}

async fn create(store: &dyn SubmissionStore, answers: &[(&str, &str)]) -> SubmissionId {
    store
        .create_submission(NewSubmission {
            task_id: "t1".into(),
            participant_id: "p1".into(),
            answers: map(answers),
            content_digest: scorekeeper_state::ContentDigest::from_bytes(b"upload"),
        })
        .await
        .unwrap()
        .submission_id
}

#[tokio::test]
async fn ingest_through_queue_scores_submission() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());
    let worker = Arc::new(ScoringWorker::new(tasks.clone(), store.clone(), fast_config()));
    let queue = ScoringQueue::start(worker);
    let ingest = SubmissionIngest::new(tasks, store.clone(), Arc::new(queue.handle()));

    // rows in reverse order: pairing is by id
    let id = ingest
        .submit(&"t1".into(), &"p1".into(), b"id,result\nb,5\na,1\n")
        .await
        .unwrap();

    let record = wait_terminal(store.as_ref(), &id).await;
    assert_eq!(record.status, ScoreStatus::Scored);
    assert_eq!(record.score, Some(1.0));
    assert!(record.scored_at.is_some());
    queue.shutdown().await;
}

#[tokio::test]
async fn many_submissions_are_all_scored() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());
    let worker = Arc::new(ScoringWorker::new(tasks.clone(), store.clone(), fast_config()));
    let queue = ScoringQueue::start(worker);
    let handle = queue.handle();

    let mut ids = Vec::new();
    for i in 0..20 {
        let id = create(store.as_ref(), &[("a", "2"), ("b", &i.to_string())]).await;
        handle.enqueue(id.clone()).await.unwrap();
        ids.push((id, (4.0 - i as f64).abs() / 2.0));
    }
    queue.shutdown().await;

    for (id, expected) in ids {
        let record = store.get_submission(&id).await.unwrap();
        assert_eq!(record.status, ScoreStatus::Scored);
        assert_eq!(record.score, Some(expected));
    }
    assert!(store.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn recover_pending_scores_backlog() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());

    // accepted while no worker was running
    let ingest = SubmissionIngest::new(tasks.clone(), store.clone(), Arc::new(NoopScheduler));
    let first = ingest
        .submit(&"t1".into(), &"p1".into(), b"id,result\na,2\nb,4\n")
        .await
        .unwrap();
    let second = ingest
        .submit(&"t1".into(), &"p2".into(), b"id,result\na,x\nb,4\n")
        .await
        .unwrap();
    assert_eq!(store.list_pending().await.unwrap().len(), 2);

    let worker = Arc::new(ScoringWorker::new(tasks, store.clone(), fast_config()));
    let queue = ScoringQueue::start(worker);
    assert_eq!(queue.recover_pending(store.as_ref()).await.unwrap(), 2);
    queue.shutdown().await;

    assert_eq!(
        store.get_submission(&first).await.unwrap().status,
        ScoreStatus::Scored
    );
    let failed = store.get_submission(&second).await.unwrap();
    assert_eq!(failed.status, ScoreStatus::Failed);
    assert!(failed.failure_reason.unwrap().contains("not a number"));
}

#[tokio::test]
async fn duplicate_jobs_write_score_once() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());
    let id = create(store.as_ref(), &[("a", "2"), ("b", "4")]).await;
    let worker = Arc::new(ScoringWorker::new(tasks, store.clone(), fast_config()));
    let queue = ScoringQueue::start(worker);
    let handle = queue.handle();
    for _ in 0..5 {
        handle.enqueue(id.clone()).await.unwrap();
    }
    queue.shutdown().await;

    let record = store.get_submission(&id).await.unwrap();
    assert_eq!(record.status, ScoreStatus::Scored);
    assert_eq!(record.score, Some(0.0));
    assert!(store.record_score(&id, 99.0).await.is_err());
    assert_eq!(store.get_submission(&id).await.unwrap().score, Some(0.0));
}

#[tokio::test]
async fn transient_store_errors_are_retried() {
    let tasks = task_store().await;
    let store = Arc::new(FlakyStore::new(2));
    let id = create(store.as_ref(), &[("a", "2"), ("b", "4")]).await;
    let worker = ScoringWorker::new(tasks, store.clone(), fast_config());

    assert_eq!(worker.process(&id).await, ScoreOutcome::Scored(0.0));
    let record = store.get_submission(&id).await.unwrap();
    assert_eq!(record.attempts, 3);
}

#[tokio::test]
async fn persistent_store_errors_exhaust_attempts() {
    let tasks = task_store().await;
    let store = Arc::new(FlakyStore::new(100));
    let id = create(store.as_ref(), &[("a", "2"), ("b", "4")]).await;
    let worker = ScoringWorker::new(tasks, store.clone(), fast_config());

    match worker.process(&id).await {
        ScoreOutcome::Failed(reason) => assert!(reason.contains("connection reset")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let record = store.get_submission(&id).await.unwrap();
    assert_eq!(record.status, ScoreStatus::Failed);
    assert_eq!(record.attempts, 3);
}

#[tokio::test]
async fn slow_attempts_time_out_and_fail() {
    let store = Arc::new(MemorySubmissionStore::new());
    let id = create(store.as_ref(), &[("a", "2"), ("b", "4")]).await;
    let config = ScoringConfig {
        attempt_timeout: Duration::from_millis(20),
        max_attempts: 2,
        ..fast_config()
    };
    let worker = ScoringWorker::new(Arc::new(SlowTaskStore), store.clone(), config);

    match worker.process(&id).await {
        ScoreOutcome::Failed(reason) => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.get_submission(&id).await.unwrap().attempts, 2);
}

#[tokio::test]
async fn id_set_mismatch_fails_at_scoring() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());
    let ingest = SubmissionIngest::new(tasks.clone(), store.clone(), Arc::new(NoopScheduler));
    // right count, wrong ids: accepted by ingest
    let id = ingest
        .submit(&"t1".into(), &"p1".into(), b"id,result\na,2\nz,4\n")
        .await
        .unwrap();

    let worker = ScoringWorker::new(tasks, store.clone(), fast_config());
    match worker.process(&id).await {
        ScoreOutcome::Failed(reason) => assert!(reason.contains("question b")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn rescoring_unchanged_inputs_is_deterministic() {
    let tasks = task_store().await;
    let store_a = Arc::new(MemorySubmissionStore::new());
    let store_b = Arc::new(MemorySubmissionStore::new());
    let answers = [("a", "2.5"), ("b", "3.25")];
    let id_a = create(store_a.as_ref(), &answers).await;
    let id_b = create(store_b.as_ref(), &answers).await;

    let a = ScoringWorker::new(tasks.clone(), store_a, fast_config()).process(&id_a).await;
    let b = ScoringWorker::new(tasks, store_b, fast_config()).process(&id_b).await;
    assert_eq!(a, b);
    assert!(matches!(a, ScoreOutcome::Scored(_)));
}

#[tokio::test]
async fn burst_beyond_queue_capacity_is_scored_by_sweep() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());
    let config = ScoringConfig {
        max_concurrency: 1,
        queue_capacity: 1,
        ..fast_config()
    };
    let slow_tasks = Arc::new(DelayedTaskStore {
        inner: tasks.clone(),
        delay: Duration::from_millis(20),
    });
    let worker = Arc::new(ScoringWorker::new(slow_tasks, store.clone(), config));
    let queue = ScoringQueue::start(worker);
    let ingest = Arc::new(SubmissionIngest::new(
        tasks,
        store.clone(),
        Arc::new(queue.handle()),
    ));

    let mut submits = Vec::new();
    for p in 0..6 {
        let ingest = Arc::clone(&ingest);
        submits.push(tokio::spawn(async move {
            let participant = ParticipantId::from(format!("p{p}"));
            ingest
                .submit(&"t1".into(), &participant, b"id,result\na,2\nb,4\n")
                .await
        }));
    }
    let mut ids = Vec::new();
    for submit in submits {
        ids.push(submit.await.unwrap().unwrap());
    }

    // most of the burst overflowed the channel; the sweep picks it up
    // while the queue keeps running
    for id in &ids {
        let record = wait_terminal(store.as_ref(), id).await;
        assert_eq!(record.status, ScoreStatus::Scored);
        assert_eq!(record.score, Some(0.0));
    }
    assert!(store.list_pending().await.unwrap().is_empty());
    queue.shutdown().await;
}

#[tokio::test]
async fn sweep_scores_unscheduled_submission() {
    let tasks = task_store().await;
    let store = Arc::new(MemorySubmissionStore::new());
    let id = create(store.as_ref(), &[("a", "2"), ("b", "4")]).await;
    let worker = Arc::new(ScoringWorker::new(tasks, store.clone(), fast_config()));
    let queue = ScoringQueue::start(worker);

    // never scheduled: only the sweep can find it
    let record = wait_terminal(store.as_ref(), &id).await;
    assert_eq!(record.status, ScoreStatus::Scored);
    queue.shutdown().await;
}

#[tokio::test]
async fn unrecorded_failure_is_retried_by_sweep() {
    let tasks = task_store().await;
    let store = Arc::new(FlakyStore::failing_failure_writes(1));
    let id = create(store.as_ref(), &[("a", "two"), ("b", "4")]).await;
    let worker = Arc::new(ScoringWorker::new(tasks, store.clone(), fast_config()));

    // first job cannot record the failure and leaves the submission pending
    assert!(matches!(worker.process(&id).await, ScoreOutcome::Deferred(_)));
    assert_eq!(store.list_pending().await.unwrap(), vec![id.clone()]);

    let queue = ScoringQueue::start(worker);
    let record = wait_terminal(store.as_ref(), &id).await;
    assert_eq!(record.status, ScoreStatus::Failed);
    assert!(record.failure_reason.unwrap().contains("not a number"));
    assert_eq!(record.attempts, 2);
    queue.shutdown().await;
}
