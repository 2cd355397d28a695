//! # Unit-of-work result record.
//!
//! [`TaskOutcome`] is what a finished job body reports back to the
//! dispatcher's completion hook, regardless of lane:
//! - the cooperative lane returns it from the spawned future,
//! - the process-isolated lane serializes it as a single JSON line on the
//!   child's stdout.
//!
//! The hook persists each present field through the matching status-store
//! setter. A completed outcome has no `error_info`; a failed one has no
//! `result`; a cancelled one has neither (but does carry `completed_at`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Status;

/// Result record produced by a unit of work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task id the outcome belongs to.
    pub task_id: i64,
    /// Terminal status reached by the job body.
    pub status: Status,
    /// Human-readable result; present on the success path only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// When the unit of work finished (successfully or not).
    pub completed_at: DateTime<Utc>,
    /// Failure detail; present on the failure path only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<String>,
}

impl TaskOutcome {
    /// Successful completion with a result payload.
    pub fn completed(task_id: i64, result: impl Into<String>) -> Self {
        Self {
            task_id,
            status: Status::Completed,
            result: Some(result.into()),
            completed_at: Utc::now(),
            error_info: None,
        }
    }

    /// Failure with an error description.
    pub fn failed(task_id: i64, error_info: impl Into<String>) -> Self {
        Self {
            task_id,
            status: Status::Failed,
            result: None,
            completed_at: Utc::now(),
            error_info: Some(error_info.into()),
        }
    }

    /// Early exit after a cancellation request was observed.
    pub fn cancelled(task_id: i64) -> Self {
        Self {
            task_id,
            status: Status::Cancelled,
            result: None,
            completed_at: Utc::now(),
            error_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_outcome_shape() {
        let o = TaskOutcome::completed(1, "done");
        assert_eq!(o.status, Status::Completed);
        assert_eq!(o.result.as_deref(), Some("done"));
        assert!(o.error_info.is_none());
    }

    #[test]
    fn test_failed_outcome_shape() {
        let o = TaskOutcome::failed(1, "boom");
        assert_eq!(o.status, Status::Failed);
        assert!(o.result.is_none());
        assert_eq!(o.error_info.as_deref(), Some("boom"));
    }

    #[test]
    fn test_cancelled_outcome_has_completion_time_but_no_result() {
        let o = TaskOutcome::cancelled(1);
        assert_eq!(o.status, Status::Cancelled);
        assert!(o.result.is_none());
        assert!(o.error_info.is_none());
    }

    #[test]
    fn test_child_result_line_decodes() {
        // the exact shape the process-isolated child prints on stdout
        let line = r#"{"task_id":9,"status":"COMPLETED","result":"ok","completed_at":"2024-01-01T00:00:00Z"}"#;
        let o: TaskOutcome = serde_json::from_str(line).unwrap();
        assert_eq!(o.task_id, 9);
        assert_eq!(o.status, Status::Completed);
        assert!(o.error_info.is_none());
    }
}
