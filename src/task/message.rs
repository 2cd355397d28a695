//! # Wire messages carried over the broker.
//!
//! Exactly two event shapes cross the `tasks` exchange:
//!
//! | Routing key     | Body                                      |
//! |-----------------|-------------------------------------------|
//! | `task`          | `{"id": <int>, "priority": "LOW"\|"MEDIUM"\|"HIGH"}` |
//! | `task_canceled` | `{"id": <int>}`                           |
//!
//! These are the *wire* payloads, not the full persisted task record — the
//! record (name, description, result, timestamps) lives in the external
//! store and never travels through the broker.

use serde::{Deserialize, Serialize};

use crate::task::Priority;

/// "Task created" event: a job to admit and execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreated {
    /// Task id, keyed to the persisted record.
    pub id: i64,
    /// Priority; drives the broker ordering weight and the lane choice.
    pub priority: Priority,
}

/// "Task cancelled" event: a request to stop an in-flight job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCancelled {
    /// Task id of the job to cancel.
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_event_decodes() {
        let ev: TaskCreated = serde_json::from_str(r#"{"id": 42, "priority": "HIGH"}"#).unwrap();
        assert_eq!(ev.id, 42);
        assert_eq!(ev.priority, Priority::High);
    }

    #[test]
    fn test_cancellation_event_decodes() {
        let ev: TaskCancelled = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(ev.id, 7);
    }
}
