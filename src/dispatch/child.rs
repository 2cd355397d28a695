//! # Worker-process entry point (`job-worker` mode).
//!
//! Runs inside the child spawned by the pool. The contract with the parent:
//!
//! - arguments: task id and duration in milliseconds,
//! - stdin: a `cancel` line requests cancellation,
//! - stdout: exactly one JSON [`TaskOutcome`] line at exit.
//!
//! The stdin reader runs on its own thread and raises a process-local flag;
//! the job body polls that flag between work slices. Everything else the
//! child prints goes to stderr, which the parent inherits.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::task::run_cpu_job;

/// Runs one CPU-bound job body to completion or cancellation and prints the
/// outcome line.
pub fn run(task_id: i64, duration: Duration) -> std::io::Result<()> {
    let cancelled = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&cancelled);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim() == "cancel" => {
                    flag.store(true, Ordering::SeqCst);
                    return;
                }
                Ok(_) => {}
                // Parent closed the pipe; no cancel is coming.
                Err(_) => return,
            }
        }
    });

    let outcome = run_cpu_job(task_id, duration, &cancelled);
    let line = serde_json::to_string(&outcome).map_err(std::io::Error::other)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}
