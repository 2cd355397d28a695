//! # Dual-lane task dispatching.
//!
//! ```text
//!        creation event
//!              │
//!              ▼
//!       TaskDispatcher ──── priority == HIGH? ────┐
//!              │                                  │
//!              ▼ no                               ▼ yes
//!     cooperative lane                  process-isolated lane
//!   (tokio task, in-process)        (ProcessPool → child process)
//!              │                                  │
//!              └────────── completion hook ───────┘
//!                     (persists terminal state)
//! ```
//!
//! ### Rules
//! - HIGH-priority work runs in a child process from a fixed-size pool;
//!   everything else runs as a cooperative tokio task.
//! - Exactly one terminal state is persisted per task, always by the
//!   completion hook, never by the cancellation path.
//! - Cancellation is idempotent and lane-aware: a token for the cooperative
//!   lane, an atomic flag relayed over the child's stdin for the isolated one.

pub mod child;

mod cancel;
mod dispatcher;
mod handle;
mod pool;

pub use cancel::CancelRegistry;
pub use dispatcher::{JobWorker, TaskDispatcher};
pub use handle::Lane;
pub use pool::{PoolCommand, ProcessPool};

pub(crate) use handle::ExecutionHandle;
