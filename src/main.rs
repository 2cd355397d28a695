//! Worker binary with two modes:
//!
//! - no arguments: the broker-fed worker (consume, dispatch, drain on signal),
//! - `job-worker <task-id> <duration-ms>`: the pooled child-process mode.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use taskpilot::app::WorkerApp;
use taskpilot::config::Config;
use taskpilot::dispatch;
use taskpilot::store::{MemoryStatusStore, StatusStore};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("job-worker") => child_main(&args[1..]),
        _ => worker_main(),
    }
}

/// Entry point for the pooled child process. Keeps stdout clean for the
/// outcome line; diagnostics go to stderr.
fn child_main(args: &[String]) -> ExitCode {
    let parsed = match args {
        [id, millis] => id.parse::<i64>().ok().zip(millis.parse::<u64>().ok()),
        _ => None,
    };
    let Some((task_id, millis)) = parsed else {
        eprintln!("usage: taskpilot-worker job-worker <task-id> <duration-ms>");
        return ExitCode::from(2);
    };

    match dispatch::child::run(task_id, Duration::from_millis(millis)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("job-worker {task_id} failed: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn worker_main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskpilot=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    // Stand-in record store; a deployment wires the external store here.
    let store: Arc<dyn StatusStore> = Arc::new(MemoryStatusStore::new());

    let app = match WorkerApp::new(config, store) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, label = e.as_label(), "failed to start worker");
            return ExitCode::FAILURE;
        }
    };

    match app.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, label = e.as_label(), "worker exited with error");
            ExitCode::FAILURE
        }
    }
}
