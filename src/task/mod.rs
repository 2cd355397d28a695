//! Task domain: wire types, lifecycle statuses, outcomes, and job bodies.

mod job;
mod message;
mod outcome;
mod types;

pub use job::{run_cpu_job, run_io_job, CANCEL_POLL_INTERVAL};
pub use message::{TaskCancelled, TaskCreated};
pub use outcome::TaskOutcome;
pub use types::{Priority, Status};
