//! # Task priority and lifecycle status.
//!
//! [`Priority`] is carried on the wire with every creation event and drives
//! two independent decisions:
//! - the broker-side **message priority** via [`Priority::weight`] (affects
//!   delivery order on priority-enabled queues only),
//! - the dispatcher's **lane choice** (a binary HIGH / non-HIGH split, made
//!   by the dispatcher — the weight plays no part in it).
//!
//! [`Status`] is the persisted lifecycle state machine:
//! ```text
//! NEW → PENDING → IN_PROGRESS → { COMPLETED | FAILED | CANCELLED }
//! ```
//! `NEW`/`PENDING` belong to the producing side; the dispatcher owns
//! `IN_PROGRESS` and the three terminal states. Terminal states are final:
//! once one is persisted, no further status write for that task id is valid.

use serde::{Deserialize, Serialize};

/// Priority of a task, as carried in the creation event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Broker-side message priority weight: LOW=1, MEDIUM=5, HIGH=10.
    ///
    /// Used only when publishing; the dispatcher never looks at it.
    pub fn weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 5,
            Priority::High => 10,
        }
    }
}

/// Persisted lifecycle status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    New,
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl Status {
    /// Returns true for the mutually-exclusive final states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }

    /// Stable wire/storage representation, also used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Pending => "PENDING",
            Status::InProgress => "IN_PROGRESS",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
            Status::Cancelled => "CANCELLED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_weights() {
        assert_eq!(Priority::Low.weight(), 1);
        assert_eq!(Priority::Medium.weight(), 5);
        assert_eq!(Priority::High.weight(), 10);
    }

    #[test]
    fn test_priority_wire_strings() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"HIGH\"");
        let p: Priority = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        let s: Status = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(s, Status::Cancelled);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(Status::Completed.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(!Status::New.is_terminal());
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::InProgress.is_terminal());
    }
}
