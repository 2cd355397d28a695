//! # Task dispatcher: admission, lane routing, cancellation, shutdown.
//!
//! [`TaskDispatcher`] consumes decoded task events and drives each task
//! through its lifecycle:
//!
//! ### Flow
//! 1. **Admission.** A creation event for an unknown id is persisted as
//!    `IN_PROGRESS` with a start timestamp; a duplicate of an in-flight id
//!    is rejected with a warning.
//! 2. **Lane routing.** HIGH priority goes to the worker-process pool;
//!    LOW/MEDIUM run as a cooperative tokio task.
//! 3. **Completion hook.** Whatever the lane, one spawned hook awaits the
//!    outcome and persists the terminal state. The hook is the *only*
//!    writer of terminal statuses, which keeps the record free of writes
//!    after a terminal state.
//! 4. **Cancellation.** `cancel_task` signals the lane-appropriate handle
//!    and waits (bounded) for the hook to settle the record. Unknown ids
//!    and repeated requests are no-ops.
//! 5. **Shutdown.** `stop()` closes admission, waits out the drain grace,
//!    force-cancels stragglers, and shuts the pool down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::{CancelRegistry, ExecutionHandle, Lane, ProcessPool};
use crate::store::StatusStore;
use crate::task::{run_io_job, Status, TaskCancelled, TaskCreated, TaskOutcome};

type InflightTable = Arc<Mutex<HashMap<i64, ExecutionHandle>>>;

/// The queue-facing surface of the dispatcher: one method per event kind,
/// plus shutdown.
#[async_trait]
pub trait JobWorker: Send + Sync {
    /// Handles a task-creation event.
    async fn process_message(&self, event: TaskCreated);

    /// Handles a task-cancellation event.
    async fn cancel_task(&self, event: TaskCancelled);

    /// Stops accepting work and drains what is in flight.
    async fn stop(&self);
}

/// Routes admitted tasks to their execution lane and owns their lifecycle.
pub struct TaskDispatcher {
    store: Arc<dyn StatusStore>,
    pool: ProcessPool,
    cancels: CancelRegistry,
    inflight: InflightTable,
    accepting: AtomicBool,
    cancel_wait: Duration,
    drain_grace: Duration,
    io_job_duration: Duration,
    cpu_job_duration: Duration,
}

impl TaskDispatcher {
    pub fn new(store: Arc<dyn StatusStore>, pool: ProcessPool, config: &Config) -> Self {
        Self {
            store,
            pool,
            cancels: CancelRegistry::new(),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            accepting: AtomicBool::new(true),
            cancel_wait: config.cancel_wait,
            drain_grace: config.drain_grace,
            io_job_duration: config.io_job_duration,
            cpu_job_duration: config.cpu_job_duration,
        }
    }

    /// Admits a creation event: persists the start of execution, launches
    /// the job body on its lane, and spawns the completion hook.
    pub async fn process_message(&self, event: TaskCreated) {
        let task_id = event.id;
        if !self.accepting.load(Ordering::SeqCst) {
            warn!(task_id, "dispatcher is stopping, creation event dropped");
            return;
        }
        if self.inflight.lock().await.contains_key(&task_id) {
            warn!(task_id, "task already in flight, duplicate event dropped");
            return;
        }

        let lane = Lane::for_priority(event.priority);
        info!(
            task_id,
            priority = ?event.priority,
            lane = lane.as_label(),
            "task admitted"
        );

        if let Err(e) = self.admit(task_id).await {
            error!(task_id, error = %e, "admission persistence failed");
            persist_terminal(
                &*self.store,
                &TaskOutcome::failed(task_id, format!("admission failed: {e}")),
            )
            .await;
            return;
        }

        let settled = CancellationToken::new();
        let (handle, source) = match lane {
            Lane::Cooperative => {
                let cancel = CancellationToken::new();
                let join = tokio::spawn(run_io_job(
                    task_id,
                    self.io_job_duration,
                    cancel.clone(),
                ));
                (
                    ExecutionHandle::Cooperative {
                        cancel,
                        settled: settled.clone(),
                    },
                    CompletionSource::Cooperative(join),
                )
            }
            Lane::ProcessIsolated => {
                let cancel = self.cancels.register(task_id);
                match self
                    .pool
                    .submit(task_id, self.cpu_job_duration, Arc::clone(&cancel))
                {
                    Ok(rx) => (
                        ExecutionHandle::ProcessIsolated {
                            cancel,
                            settled: settled.clone(),
                        },
                        CompletionSource::Process(rx),
                    ),
                    Err(e) => {
                        error!(task_id, error = %e, label = e.as_label(), "pool rejected task");
                        self.cancels.remove(task_id);
                        persist_terminal(
                            &*self.store,
                            &TaskOutcome::failed(task_id, format!("worker pool unavailable: {e}")),
                        )
                        .await;
                        return;
                    }
                }
            }
        };

        self.inflight.lock().await.insert(task_id, handle);

        let store = Arc::clone(&self.store);
        let inflight = Arc::clone(&self.inflight);
        let cancels = self.cancels.clone();
        tokio::spawn(completion_hook(
            store, inflight, cancels, task_id, lane, settled, source,
        ));
    }

    /// Cancels an in-flight task and waits (bounded) for it to settle.
    ///
    /// Idempotent: unknown or already settled ids are logged and ignored,
    /// and repeating a request for the same id only re-raises an already
    /// raised signal.
    pub async fn cancel_task(&self, event: TaskCancelled) {
        let task_id = event.id;
        let handle = match self.inflight.lock().await.get(&task_id) {
            Some(handle) => handle.clone(),
            None => {
                debug!(task_id, "cancellation for unknown or settled task ignored");
                return;
            }
        };

        info!(task_id, lane = handle.lane().as_label(), "cancellation requested");
        handle.request_cancel();

        let settled = handle.settled().clone();
        if tokio::time::timeout(self.cancel_wait, settled.cancelled())
            .await
            .is_err()
        {
            warn!(task_id, "task did not settle within the cancellation wait");
        }
    }

    /// Stops admission, drains in-flight tasks within the grace period,
    /// force-cancels anything still running, then shuts the pool down.
    pub async fn stop(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        info!("dispatcher stopping, draining in-flight tasks");

        if tokio::time::timeout(self.drain_grace, self.wait_idle())
            .await
            .is_err()
        {
            let stragglers: Vec<ExecutionHandle> =
                self.inflight.lock().await.values().cloned().collect();
            warn!(
                count = stragglers.len(),
                "drain grace elapsed, force-cancelling remaining tasks"
            );
            for handle in &stragglers {
                handle.request_cancel();
            }
            for handle in stragglers {
                let settled = handle.settled().clone();
                let _ = tokio::time::timeout(self.cancel_wait, settled.cancelled()).await;
            }
        }

        self.pool.shutdown().await;
        info!("dispatcher stopped");
    }

    async fn admit(&self, task_id: i64) -> Result<(), crate::error::StoreError> {
        self.store.set_status(task_id, Status::InProgress).await?;
        self.store
            .set_started_at(task_id, chrono::Utc::now())
            .await?;
        Ok(())
    }

    async fn wait_idle(&self) {
        loop {
            if self.inflight.lock().await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[cfg(test)]
    async fn inflight_count(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

#[async_trait]
impl JobWorker for TaskDispatcher {
    async fn process_message(&self, event: TaskCreated) {
        self.process_message(event).await;
    }

    async fn cancel_task(&self, event: TaskCancelled) {
        self.cancel_task(event).await;
    }

    async fn stop(&self) {
        self.stop().await;
    }
}

/// Where a task's outcome arrives from, per lane.
enum CompletionSource {
    Cooperative(JoinHandle<TaskOutcome>),
    Process(tokio::sync::oneshot::Receiver<TaskOutcome>),
}

/// Awaits a task's outcome, persists its terminal state, and releases every
/// piece of dispatcher bookkeeping. Runs once per admitted task.
async fn completion_hook(
    store: Arc<dyn StatusStore>,
    inflight: InflightTable,
    cancels: CancelRegistry,
    task_id: i64,
    lane: Lane,
    settled: CancellationToken,
    source: CompletionSource,
) {
    let outcome = match source {
        CompletionSource::Cooperative(join) => match join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(task_id, error = %e, "job body panicked");
                TaskOutcome::failed(task_id, "job body panicked")
            }
        },
        CompletionSource::Process(rx) => match rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(task_id, "worker pool dropped the job");
                TaskOutcome::failed(task_id, "worker pool dropped the job")
            }
        },
    };

    persist_terminal(&*store, &outcome).await;

    inflight.lock().await.remove(&task_id);
    cancels.remove(task_id);
    settled.cancel();

    info!(
        task_id,
        lane = lane.as_label(),
        status = outcome.status.as_str(),
        "task settled"
    );
}

/// Persists a terminal outcome field by field. Store failures are logged
/// and never block the dispatcher's own bookkeeping.
async fn persist_terminal(store: &dyn StatusStore, outcome: &TaskOutcome) {
    let task_id = outcome.task_id;
    if let Err(e) = store.set_status(task_id, outcome.status).await {
        error!(task_id, error = %e, "failed to persist terminal status");
    }
    if let Err(e) = store.set_completed_at(task_id, outcome.completed_at).await {
        error!(task_id, error = %e, "failed to persist completion time");
    }
    if let Some(result) = &outcome.result {
        if let Err(e) = store.set_result(task_id, result).await {
            error!(task_id, error = %e, "failed to persist result");
        }
    }
    if let Some(error_info) = &outcome.error_info {
        if let Err(e) = store.set_error_info(task_id, error_info).await {
            error!(task_id, error = %e, "failed to persist error info");
        }
    }
}
