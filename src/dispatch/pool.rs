//! # Fixed-size worker-process pool.
//!
//! The process-isolated lane runs HIGH-priority job bodies in child
//! processes, so a hot loop cannot starve the event loop. The pool itself is
//! a fixed set of management threads pulling [`PoolJob`]s off a shared
//! queue:
//!
//! ```text
//!   submit() ──► mpsc queue ──► pool-worker-N thread ──► child process
//!                                       │
//!                                oneshot ◄── TaskOutcome (stdout JSON line)
//! ```
//!
//! ### Flow
//! 1. A management thread receives a job and spawns the worker child with
//!    the task id and duration as arguments.
//! 2. While the child runs, the thread polls the job's cancel flag; a raised
//!    flag is relayed once as a `cancel` line on the child's stdin.
//! 3. The child prints its [`TaskOutcome`] as one JSON line on stdout; the
//!    thread parses it and resolves the submitter's oneshot.
//!
//! A job whose flag is already raised when a thread picks it up is settled
//! as cancelled without spawning a process. After [`ProcessPool::shutdown`]
//! the queue is closed: threads drain what was already submitted and exit.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::error::DispatchError;
use crate::task::TaskOutcome;

/// How often a management thread checks the child and the cancel flag.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The command line a management thread launches for each job; the task id
/// and duration in milliseconds are appended as trailing arguments.
#[derive(Clone, Debug)]
pub struct PoolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl PoolCommand {
    /// The deployment command: re-execute the current binary in its
    /// `job-worker` mode.
    pub fn job_worker() -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["job-worker".to_string()],
        })
    }
}

/// One queued unit of work for a management thread.
struct PoolJob {
    task_id: i64,
    duration: Duration,
    cancel: Arc<AtomicBool>,
    done: oneshot::Sender<TaskOutcome>,
}

/// Fixed-size pool of management threads driving worker child processes.
pub struct ProcessPool {
    submit_tx: Mutex<Option<mpsc::Sender<PoolJob>>>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ProcessPool {
    /// Starts `size` management threads running `command` per job.
    pub fn spawn(size: usize, command: PoolCommand) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::channel::<PoolJob>();
        let rx = Arc::new(Mutex::new(rx));

        let mut threads = Vec::with_capacity(size);
        for n in 0..size {
            let rx = Arc::clone(&rx);
            let command = command.clone();
            let handle = thread::Builder::new()
                .name(format!("pool-worker-{n}"))
                .spawn(move || pool_worker(&rx, &command))
                .map_err(|e| DispatchError::PoolSpawn(e.to_string()))?;
            threads.push(handle);
        }

        Ok(Self {
            submit_tx: Mutex::new(Some(tx)),
            threads: Mutex::new(threads),
        })
    }

    /// Queues a job; the receiver resolves with its [`TaskOutcome`].
    pub fn submit(
        &self,
        task_id: i64,
        duration: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Result<oneshot::Receiver<TaskOutcome>, DispatchError> {
        let (done, outcome_rx) = oneshot::channel();
        let job = PoolJob {
            task_id,
            duration,
            cancel,
            done,
        };

        let tx = lock(&self.submit_tx);
        match tx.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| DispatchError::PoolClosed)?,
            None => return Err(DispatchError::PoolClosed),
        }
        Ok(outcome_rx)
    }

    /// Closes the queue and joins every management thread. Jobs already
    /// queued still run; new submissions fail with `PoolClosed`.
    pub async fn shutdown(&self) {
        drop(lock(&self.submit_tx).take());
        let threads = std::mem::take(&mut *lock(&self.threads));
        let joined = tokio::task::spawn_blocking(move || {
            for handle in threads {
                let _ = handle.join();
            }
        })
        .await;
        if joined.is_err() {
            warn!("worker pool join task failed");
        }
        debug!("worker pool shut down");
    }
}

fn pool_worker(rx: &Arc<Mutex<mpsc::Receiver<PoolJob>>>, command: &PoolCommand) {
    loop {
        let job = {
            let rx = lock(rx);
            rx.recv()
        };
        let job = match job {
            Ok(job) => job,
            // Queue closed: pool is shutting down.
            Err(_) => return,
        };

        let outcome = if job.cancel.load(Ordering::SeqCst) {
            debug!(task_id = job.task_id, "job cancelled before start");
            TaskOutcome::cancelled(job.task_id)
        } else {
            run_in_child(command, &job)
        };

        if job.done.send(outcome).is_err() {
            warn!(task_id = job.task_id, "outcome receiver dropped");
        }
    }
}

/// Runs one job in a worker child process and collects its outcome.
fn run_in_child(command: &PoolCommand, job: &PoolJob) -> TaskOutcome {
    let mut child = match Command::new(&command.program)
        .args(&command.args)
        .arg(job.task_id.to_string())
        .arg(job.duration.as_millis().to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!(task_id = job.task_id, error = %e, "failed to spawn worker process");
            return TaskOutcome::failed(job.task_id, format!("failed to spawn worker process: {e}"));
        }
    };

    let mut stdin = child.stdin.take();
    let mut cancel_relayed = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                error!(task_id = job.task_id, error = %e, "lost track of worker process");
                let _ = child.kill();
                let _ = child.wait();
                return TaskOutcome::failed(job.task_id, format!("worker process wait failed: {e}"));
            }
        }

        if !cancel_relayed && job.cancel.load(Ordering::SeqCst) {
            if let Some(pipe) = stdin.as_mut() {
                let _ = pipe.write_all(b"cancel\n").and_then(|_| pipe.flush());
            }
            cancel_relayed = true;
            debug!(task_id = job.task_id, "cancel relayed to worker process");
        }

        thread::sleep(CHILD_POLL_INTERVAL);
    };
    drop(stdin);

    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_string(&mut output);
    }

    match output.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(line) => match serde_json::from_str::<TaskOutcome>(line) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(task_id = job.task_id, error = %e, "worker produced unreadable outcome");
                TaskOutcome::failed(job.task_id, format!("unreadable worker outcome: {e}"))
            }
        },
        None => {
            error!(task_id = job.task_id, %status, "worker exited without an outcome");
            TaskOutcome::failed(
                job.task_id,
                format!("worker exited without an outcome ({status})"),
            )
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) mod stubs {
    use super::PoolCommand;

    /// A stand-in worker that immediately prints a completed outcome.
    /// The pool appends the task id and duration; `sh -c` binds the id
    /// to `$0`.
    pub(crate) fn completing() -> PoolCommand {
        PoolCommand {
            program: "/bin/sh".into(),
            args: vec![
                "-c".to_string(),
                r#"printf '{"task_id":%s,"status":"COMPLETED","result":"ok","completed_at":"2024-01-01T00:00:00Z"}' "$0""#
                    .to_string(),
            ],
        }
    }

    /// A stand-in worker that blocks until a cancel line arrives, then
    /// prints a cancelled outcome.
    pub(crate) fn cancel_aware() -> PoolCommand {
        PoolCommand {
            program: "/bin/sh".into(),
            args: vec![
                "-c".to_string(),
                r#"read line; printf '{"task_id":%s,"status":"CANCELLED","completed_at":"2024-01-01T00:00:00Z"}' "$0""#
                    .to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Status;

    #[tokio::test]
    async fn test_submitted_job_completes() {
        let pool = ProcessPool::spawn(1, stubs::completing()).unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let rx = pool.submit(11, Duration::from_millis(1), flag).unwrap();

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.task_id, 11);
        assert_eq!(outcome.status, Status::Completed);
        assert_eq!(outcome.result.as_deref(), Some("ok"));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_the_process() {
        let pool = ProcessPool::spawn(1, stubs::completing()).unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let rx = pool
            .submit(12, Duration::from_millis(1), Arc::clone(&flag))
            .unwrap();

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.status, Status::Cancelled);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_is_relayed_to_a_running_child() {
        let pool = ProcessPool::spawn(1, stubs::cancel_aware()).unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let rx = pool
            .submit(13, Duration::from_secs(30), Arc::clone(&flag))
            .unwrap();

        // Let the child start, then raise the flag.
        tokio::time::sleep(Duration::from_millis(200)).await;
        flag.store(true, Ordering::SeqCst);

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.task_id, 13);
        assert_eq!(outcome.status, Status::Cancelled);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let pool = ProcessPool::spawn(1, stubs::completing()).unwrap();
        pool.shutdown().await;

        let flag = Arc::new(AtomicBool::new(false));
        let err = pool
            .submit(14, Duration::from_millis(1), flag)
            .err()
            .unwrap();
        assert!(matches!(err, DispatchError::PoolClosed));
    }
}
