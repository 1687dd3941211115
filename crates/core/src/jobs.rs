// Asynchronous job manager: scheduling, bounded concurrency,
// cancellation, result retention.
//
// Jobs flow through a state machine:
//   pending → running → succeeded   (happy path)
//   pending → running → failed      (handler fault)
//   pending | running → cancelled   (caller cancel)
//
// The job table is the only shared mutable state in the core; every
// mutation goes through this module, so callers only ever see immutable
// snapshots. Backpressure: once `max_pending` jobs wait in the queue,
// `schedule` fails with `CapacityExceeded` instead of growing
// unbounded. Terminal snapshots are retained for a bounded window, then
// evicted by a periodic sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use folio_common::error::{HandlerFault, OperationError};
use folio_common::types::{Caller, JobSnapshot, JobState};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::JobConfig;
use crate::registry::HandlerFuture;

/// A bound handler invocation: everything captured except the
/// cancellation token the worker hands in.
pub type JobInvocation = Box<dyn FnOnce(CancellationToken) -> HandlerFuture + Send>;

struct QueuedJob {
    id: Uuid,
    invocation: JobInvocation,
}

struct JobRecord {
    id: Uuid,
    operation_id: String,
    owner_key: String,
    state: JobState,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    result: Option<serde_json::Value>,
    error: Option<HandlerFault>,
    cancel: CancellationToken,
}

impl JobRecord {
    fn new(id: Uuid, operation_id: &str, owner_key: String) -> Self {
        Self {
            id,
            operation_id: operation_id.to_string(),
            owner_key,
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            operation_id: self.operation_id.clone(),
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

type JobTable = Arc<RwLock<HashMap<Uuid, JobRecord>>>;

/// Owns the lifecycle of every asynchronous job. Cheap to clone; all
/// clones share one table, queue, and worker pool.
#[derive(Clone)]
pub struct JobManager {
    config: JobConfig,
    table: JobTable,
    queue_tx: mpsc::Sender<QueuedJob>,
    shutdown: CancellationToken,
}

impl JobManager {
    /// Spawn the worker pool and retention sweeper, returning the
    /// manager handle.
    pub fn start(config: JobConfig) -> Self {
        let table: JobTable = Arc::new(RwLock::new(HashMap::new()));
        let (queue_tx, queue_rx) = mpsc::channel(config.max_pending.max(1));
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let shutdown = CancellationToken::new();

        for worker_index in 0..config.effective_workers() {
            tokio::spawn(run_worker(
                worker_index,
                Arc::clone(&table),
                Arc::clone(&queue_rx),
                shutdown.clone(),
                config.cancel_grace(),
            ));
        }

        tokio::spawn(run_sweeper(
            Arc::clone(&table),
            shutdown.clone(),
            config.sweep_interval(),
            config.retention(),
        ));

        Self { config, table, queue_tx, shutdown }
    }

    /// Create a `pending` job, enqueue it, and return immediately.
    ///
    /// Fails with `CapacityExceeded` — creating no job entry — when the
    /// pending queue is at its configured bound.
    pub async fn schedule(
        &self,
        operation_id: &str,
        invocation: JobInvocation,
        owner_key: String,
    ) -> Result<Uuid, OperationError> {
        let permit = self.queue_tx.try_reserve().map_err(|error| match error {
            TrySendError::Full(()) => OperationError::CapacityExceeded,
            // Shutdown race: the queue is gone, surface as backpressure.
            TrySendError::Closed(()) => OperationError::CapacityExceeded,
        })?;

        let id = Uuid::new_v4();
        self.table.write().await.insert(id, JobRecord::new(id, operation_id, owner_key));
        permit.send(QueuedJob { id, invocation });

        debug!(job_id = %id, operation = operation_id, "job scheduled");
        Ok(id)
    }

    /// Immutable snapshot of one job. Only the owner or a caller with
    /// the job-admin scope may look.
    pub async fn get_status(
        &self,
        job_id: Uuid,
        caller: &Caller,
    ) -> Result<JobSnapshot, OperationError> {
        let table = self.table.read().await;
        let record = table.get(&job_id).ok_or(OperationError::NotFound)?;
        authorize_access(record, caller)?;
        Ok(record.snapshot())
    }

    /// Cancel a job. Pending jobs finalize immediately; running jobs are
    /// finalized in the table right away (after this returns,
    /// `get_status` never again reports `pending` or `running`) while
    /// the worker gives the handler a bounded grace window to observe
    /// its token and unwind.
    pub async fn cancel(
        &self,
        job_id: Uuid,
        caller: &Caller,
    ) -> Result<JobSnapshot, OperationError> {
        let mut table = self.table.write().await;
        let record = table.get_mut(&job_id).ok_or(OperationError::NotFound)?;
        authorize_access(record, caller)?;

        if record.state.is_terminal() {
            return Err(OperationError::AlreadyTerminal);
        }

        record.state = JobState::Cancelled;
        record.finished_at = Some(Utc::now());
        record.cancel.cancel();

        debug!(job_id = %job_id, "job cancelled");
        Ok(record.snapshot())
    }

    /// Evict terminal snapshots past the retention window. The sweeper
    /// calls this on its own cadence; tests call it directly.
    pub async fn sweep_now(&self) {
        sweep_expired(&self.table, self.config.retention()).await;
    }

    /// Number of jobs currently retained (all states).
    pub async fn retained_len(&self) -> usize {
        self.table.read().await.len()
    }

    /// Stop the worker pool and sweeper. Running handlers are dropped
    /// with the runtime; the table stays readable until the manager is
    /// dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn authorize_access(record: &JobRecord, caller: &Caller) -> Result<(), OperationError> {
    if record.owner_key == caller.owner_key() || caller.is_job_admin() {
        return Ok(());
    }
    Err(OperationError::Forbidden)
}

async fn run_worker(
    worker_index: usize,
    table: JobTable,
    queue_rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    shutdown: CancellationToken,
    cancel_grace: Duration,
) {
    debug!(worker_index, "job worker started");
    loop {
        // Lock scope covers only the dequeue; admission stays FIFO
        // because workers line up on the one receiver.
        let queued = {
            let mut queue_rx = queue_rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => return,
                queued = queue_rx.recv() => queued,
            }
        };

        let Some(queued) = queued else { return };
        run_job(&table, queued, cancel_grace).await;
    }
}

async fn run_job(table: &JobTable, queued: QueuedJob, cancel_grace: Duration) {
    let cancel = {
        let mut table = table.write().await;
        let Some(record) = table.get_mut(&queued.id) else {
            // Swept or never inserted; nothing to run.
            return;
        };
        if record.state.is_terminal() {
            // Cancelled while still pending; discard the invocation.
            return;
        }
        record.state = JobState::Running;
        record.started_at = Some(Utc::now());
        record.cancel.clone()
    };

    let future = (queued.invocation)(cancel.clone());
    tokio::pin!(future);

    let outcome = tokio::select! {
        outcome = &mut future => Some(outcome),
        _ = cancel.cancelled() => {
            // The snapshot is already terminal `cancelled`. Keep driving
            // the handler for the grace window so it can observe the
            // token and release what it holds, then drop it.
            if tokio::time::timeout(cancel_grace, &mut future).await.is_err() {
                warn!(
                    job_id = %queued.id,
                    grace_secs = cancel_grace.as_secs(),
                    "handler ignored cancellation; dropped after grace period"
                );
            }
            None
        }
    };

    if let Some(outcome) = outcome {
        finalize(table, queued.id, outcome).await;
    }
}

async fn finalize(
    table: &JobTable,
    job_id: Uuid,
    outcome: Result<serde_json::Value, HandlerFault>,
) {
    let mut table = table.write().await;
    let Some(record) = table.get_mut(&job_id) else { return };
    if record.state.is_terminal() {
        // A cancel raced the completion; the cancelled verdict stands
        // and the late output is discarded.
        return;
    }

    record.finished_at = Some(Utc::now());
    match outcome {
        Ok(value) => {
            record.state = JobState::Succeeded;
            record.result = Some(value);
        }
        Err(fault) => {
            warn!(job_id = %job_id, fault = %fault, "job failed");
            record.state = JobState::Failed;
            record.error = Some(fault);
        }
    }
}

async fn run_sweeper(
    table: JobTable,
    shutdown: CancellationToken,
    sweep_interval: Duration,
    retention: Duration,
) {
    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => sweep_expired(&table, retention).await,
        }
    }
}

async fn sweep_expired(table: &JobTable, retention: Duration) {
    let horizon = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
    let now = Utc::now();

    let mut table = table.write().await;
    let before = table.len();
    table.retain(|_, record| {
        if !record.state.is_terminal() {
            return true;
        }
        match record.finished_at {
            Some(finished_at) => now.signed_duration_since(finished_at) < horizon,
            None => true,
        }
    });

    let evicted = before - table.len();
    if evicted > 0 {
        debug!(evicted, retained = table.len(), "swept expired job snapshots");
    }
}
