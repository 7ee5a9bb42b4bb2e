//! In-process scoring queue.
//!
//! A bounded channel feeds a dispatcher task that runs scoring jobs on the
//! tokio runtime, at most `max_concurrency` at a time. The channel itself is
//! not durable: submissions are persisted as pending before they are
//! scheduled, and a sweep re-enqueues whatever is still pending every
//! `recovery_interval`, covering jobs dropped on a full channel, failures
//! that could not be recorded, and work left over from a previous run.
//!
//! An id is queued at most once at a time. Scheduling an id that is already
//! queued or running is a no-op.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scorekeeper_state::{SubmissionId, SubmissionStore};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::worker::ScoringWorker;
use crate::domain::Result;

/// Why a job could not be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("scoring queue is full")]
    Full,
    #[error("scoring queue is closed")]
    Closed,
}

/// Accepts submission ids for deferred scoring. Must not block.
pub trait ScoreScheduler: Send + Sync {
    fn schedule(&self, id: SubmissionId) -> std::result::Result<(), ScheduleError>;
}

/// Scheduler that does nothing; submissions stay pending until recovered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl ScoreScheduler for NoopScheduler {
    fn schedule(&self, _id: SubmissionId) -> std::result::Result<(), ScheduleError> {
        Ok(())
    }
}

/// Ids sitting in the channel or being scored.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<SubmissionId>>);

impl InFlight {
    fn ids(&self) -> MutexGuard<'_, HashSet<SubmissionId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// False when the id is already queued or running.
    fn claim(&self, id: &SubmissionId) -> bool {
        self.ids().insert(id.clone())
    }

    fn release(&self, id: &SubmissionId) {
        self.ids().remove(id);
    }
}

/// Cloneable sending side of a [`ScoringQueue`].
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: mpsc::Sender<SubmissionId>,
    in_flight: Arc<InFlight>,
}

impl QueueHandle {
    fn new(sender: mpsc::Sender<SubmissionId>) -> Self {
        Self {
            sender,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Enqueue, waiting for capacity.
    ///
    /// Returns `false` when the id was already queued or running.
    pub async fn enqueue(&self, id: SubmissionId) -> std::result::Result<bool, ScheduleError> {
        if !self.in_flight.claim(&id) {
            return Ok(false);
        }
        match self.sender.send(id).await {
            Ok(()) => Ok(true),
            Err(mpsc::error::SendError(id)) => {
                self.in_flight.release(&id);
                Err(ScheduleError::Closed)
            }
        }
    }

    /// Enqueue every pending submission in the store that is not already
    /// queued or running, oldest first.
    ///
    /// Returns how many were enqueued.
    pub async fn recover_pending(&self, store: &dyn SubmissionStore) -> Result<usize> {
        let pending = store.list_pending().await?;
        let total = pending.len();
        let mut enqueued = 0;
        for id in pending {
            match self.enqueue(id).await {
                Ok(true) => enqueued += 1,
                Ok(false) => {}
                Err(_) => {
                    warn!(enqueued, total, "scoring queue closed during recovery");
                    return Ok(enqueued);
                }
            }
        }
        if enqueued > 0 {
            info!(count = enqueued, "re-enqueued pending submissions");
        }
        Ok(enqueued)
    }
}

impl ScoreScheduler for QueueHandle {
    fn schedule(&self, id: SubmissionId) -> std::result::Result<(), ScheduleError> {
        if !self.in_flight.claim(&id) {
            return Ok(());
        }
        self.sender.try_send(id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(id) => {
                self.in_flight.release(&id);
                ScheduleError::Full
            }
            mpsc::error::TrySendError::Closed(id) => {
                self.in_flight.release(&id);
                ScheduleError::Closed
            }
        })
    }
}

/// Running scoring queue. Call [`shutdown`](Self::shutdown) to stop it.
pub struct ScoringQueue {
    handle: QueueHandle,
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl ScoringQueue {
    /// Spawn the dispatcher and the pending sweep on the current runtime.
    pub fn start(worker: Arc<ScoringWorker>) -> Self {
        let capacity = worker.config().queue_capacity.max(1);
        let period = worker.config().recovery_interval;
        let (sender, receiver) = mpsc::channel(capacity);
        let handle = QueueHandle::new(sender);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let sweeper = tokio::spawn(sweep(
            handle.clone(),
            worker.submissions(),
            period,
            shutdown_rx.clone(),
        ));
        let dispatcher = tokio::spawn(dispatch(
            worker,
            receiver,
            Arc::clone(&handle.in_flight),
            shutdown_rx,
        ));
        Self {
            handle,
            shutdown,
            dispatcher,
            sweeper,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// See [`QueueHandle::recover_pending`].
    pub async fn recover_pending(&self, store: &dyn SubmissionStore) -> Result<usize> {
        self.handle.recover_pending(store).await
    }

    /// Stop accepting jobs, run what is already queued, and wait for every
    /// in-flight job to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.sweeper.await {
            warn!(error = %e, "pending sweep ended abnormally");
        }
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "scoring dispatcher ended abnormally");
        }
    }
}

async fn sweep(
    handle: QueueHandle,
    store: Arc<dyn SubmissionStore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = period.max(Duration::from_millis(1));
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = shutdown.changed() => break,
        }
        if let Err(e) = handle.recover_pending(store.as_ref()).await {
            warn!(error = %e, "pending sweep failed");
        }
    }
    debug!("pending sweep stopped");
}

enum Step {
    Job(Option<SubmissionId>),
    Close,
}

async fn dispatch(
    worker: Arc<ScoringWorker>,
    mut jobs: mpsc::Receiver<SubmissionId>,
    in_flight: Arc<InFlight>,
    mut shutdown: watch::Receiver<bool>,
) {
    let limit = u32::try_from(worker.config().max_concurrency.max(1)).unwrap_or(u32::MAX);
    let permits = Arc::new(Semaphore::new(limit as usize));
    let mut closing = false;

    loop {
        let step = if closing {
            Step::Job(jobs.recv().await)
        } else {
            tokio::select! {
                id = jobs.recv() => Step::Job(id),
                _ = shutdown.changed() => Step::Close,
            }
        };
        let id = match step {
            Step::Job(Some(id)) => id,
            Step::Job(None) => break,
            Step::Close => {
                closing = true;
                jobs.close();
                continue;
            }
        };

        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let worker = Arc::clone(&worker);
        let in_flight = Arc::clone(&in_flight);
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = worker.process(&id).await;
            in_flight.release(&id);
            debug!(submission_id = %id, ?outcome, "scoring job finished");
        });
    }

    // Every permit back means every job is done.
    if permits.acquire_many(limit).await.is_err() {
        warn!("scoring semaphore closed before jobs drained");
    }
    debug!("scoring dispatcher stopped");
}
