//! # taskpilot
//!
//! Broker-fed background job processing with dual-lane execution.
//!
//! ```text
//!                 topic exchange "tasks"
//!                  │               │
//!            queue "task"   queue "task_canceled"
//!                  │               │
//!                  ▼               ▼
//!   BrokerConnector ──► QueueConsumer ──► routing-key handlers
//!    (pooled conns/                            │
//!     channels)                                ▼
//!                                       TaskDispatcher
//!                                      │             │
//!                              cooperative     process-isolated
//!                               tokio task      ProcessPool child
//!                                      │             │
//!                                      └── completion hook ──► StatusStore
//! ```
//!
//! ## Modules
//! - [`broker`]: pooled AMQP access, publishing, queue consumption.
//! - [`dispatch`]: lane routing, the worker-process pool, cancellation.
//! - [`store`]: the status-persistence seam and its in-memory implementation.
//! - [`task`]: event/outcome types and the simulated job bodies.
//! - [`app`]: wiring and the run-until-signal lifecycle.
//!
//! ## Guarantees
//! - Exactly one terminal status is persisted per task, by its completion
//!   hook; cancellation never writes a status after a terminal one.
//! - Every delivery is acked; malformed or unroutable messages are dropped
//!   with a log line, never requeued.
//! - Cancellation is idempotent and crosses the process boundary for the
//!   isolated lane.

pub mod app;
pub mod broker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod store;
pub mod task;

pub use app::WorkerApp;
pub use broker::{BrokerConnector, EventPublisher, QueueConsumer};
pub use config::Config;
pub use dispatch::{JobWorker, TaskDispatcher};
pub use error::{BrokerError, DispatchError, RuntimeError, StoreError};
pub use store::{MemoryStatusStore, StatusStore};
pub use task::{Priority, Status, TaskCancelled, TaskCreated, TaskOutcome};
