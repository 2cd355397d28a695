//! # Broker layer: connector, publisher, consumer, and topology constants.
//!
//! ## Topology
//! ```text
//! topic exchange "tasks"
//!   ├── queue "task"           (durable, x-max-priority = 3)  → creation events
//!   └── queue "task_canceled"  (durable)                      → cancellation events
//! ```
//! Each queue is bound under its own name as the binding key, so the routing
//! key doubles as the handler-registry key on the consuming side.

mod connector;
mod consumer;
mod publisher;

pub use connector::BrokerConnector;
pub use consumer::{handler, Handler, QueueConsumer};
pub use publisher::EventPublisher;

/// Topic exchange all task events flow through.
pub const TASKS_EXCHANGE: &str = "tasks";

/// Routing key for "task created" events.
pub const ROUTE_TASK: &str = "task";

/// Routing key for "task cancelled" events.
pub const ROUTE_TASK_CANCELED: &str = "task_canceled";

/// `x-max-priority` of the creation queue.
pub const TASK_QUEUE_MAX_PRIORITY: u8 = 3;
