//! # Simulated job bodies, one per lane.
//!
//! The subsystem's units of work are stand-ins for real workloads, but their
//! cancellation contracts are the real design:
//!
//! - [`run_io_job`] — cooperative lane. Suspends on the event loop and
//!   observes cancellation *natively* through a [`CancellationToken`].
//! - [`run_cpu_job`] — process-isolated lane. Runs inside the child process
//!   with no event loop; it polls a process-local cancel flag every
//!   [`CANCEL_POLL_INTERVAL`] slice. A body that blocks without polling
//!   cannot be cancelled mid-call — cancellation is best-effort by design.
//!
//! Both return a [`TaskOutcome`]; neither panics on the happy path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::task::TaskOutcome;

/// Granularity at which the CPU-bound body re-checks its cancel flag.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cooperative (I/O-bound) job body.
///
/// Simulates remote I/O with a cancellable sleep; cancellation wins the race
/// against completion whenever the token fires first.
pub async fn run_io_job(task_id: i64, duration: Duration, ctx: CancellationToken) -> TaskOutcome {
    tokio::select! {
        _ = ctx.cancelled() => TaskOutcome::cancelled(task_id),
        _ = tokio::time::sleep(duration) => {
            TaskOutcome::completed(task_id, "fetched user id = 555")
        }
    }
}

/// CPU-bound job body, executed inside the worker child process.
///
/// Computes its payload up front, then burns the configured duration in
/// [`CANCEL_POLL_INTERVAL`] slices, checking `cancelled` between slices.
pub fn run_cpu_job(task_id: i64, duration: Duration, cancelled: &AtomicBool) -> TaskOutcome {
    let sum: u64 = (1..=10u64).map(|i| (i * 10) * (i * 10)).sum();

    let started = Instant::now();
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return TaskOutcome::cancelled(task_id);
        }
        let elapsed = started.elapsed();
        if elapsed >= duration {
            break;
        }
        std::thread::sleep(CANCEL_POLL_INTERVAL.min(duration - elapsed));
    }

    TaskOutcome::completed(task_id, format!("sum of squares = {sum}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Status;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_io_job_completes_with_result() {
        let outcome = run_io_job(1, Duration::from_millis(10), CancellationToken::new()).await;
        assert_eq!(outcome.status, Status::Completed);
        assert!(outcome.result.is_some());
    }

    #[tokio::test]
    async fn test_io_job_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_io_job(1, Duration::from_secs(60), token).await;
        assert_eq!(outcome.status, Status::Cancelled);
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_cpu_job_computes_sum_of_squares() {
        let flag = AtomicBool::new(false);
        let outcome = run_cpu_job(2, Duration::from_millis(1), &flag);
        assert_eq!(outcome.status, Status::Completed);
        assert_eq!(outcome.result.as_deref(), Some("sum of squares = 38500"));
    }

    #[test]
    fn test_cpu_job_exits_early_on_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            setter.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        let outcome = run_cpu_job(3, Duration::from_secs(30), &flag);
        handle.join().unwrap();

        assert_eq!(outcome.status, Status::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
