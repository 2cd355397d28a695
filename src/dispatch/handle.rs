//! Per-task execution handles held in the dispatcher's in-flight table.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::task::Priority;

/// Which execution lane a task was admitted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    /// In-process tokio task; cancellation via [`CancellationToken`].
    Cooperative,
    /// Child process from the worker pool; cancellation via relayed flag.
    ProcessIsolated,
}

impl Lane {
    /// Lane selection rule: HIGH priority is isolated, everything else is
    /// cooperative.
    pub fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::High => Lane::ProcessIsolated,
            Priority::Low | Priority::Medium => Lane::Cooperative,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Lane::Cooperative => "cooperative",
            Lane::ProcessIsolated => "process_isolated",
        }
    }
}

/// Cancellation and settlement handle for one in-flight task.
///
/// `settled` fires once the completion hook has finished its bookkeeping,
/// so cancellation callers can wait for the terminal state to be persisted.
#[derive(Clone)]
pub(crate) enum ExecutionHandle {
    Cooperative {
        cancel: CancellationToken,
        settled: CancellationToken,
    },
    ProcessIsolated {
        cancel: Arc<AtomicBool>,
        settled: CancellationToken,
    },
}

impl ExecutionHandle {
    pub(crate) fn lane(&self) -> Lane {
        match self {
            ExecutionHandle::Cooperative { .. } => Lane::Cooperative,
            ExecutionHandle::ProcessIsolated { .. } => Lane::ProcessIsolated,
        }
    }

    /// Signals the job body to stop. Idempotent.
    pub(crate) fn request_cancel(&self) {
        match self {
            ExecutionHandle::Cooperative { cancel, .. } => cancel.cancel(),
            ExecutionHandle::ProcessIsolated { cancel, .. } => {
                cancel.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Token that fires once the task's terminal state is persisted.
    pub(crate) fn settled(&self) -> &CancellationToken {
        match self {
            ExecutionHandle::Cooperative { settled, .. }
            | ExecutionHandle::ProcessIsolated { settled, .. } => settled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_selection_by_priority() {
        assert_eq!(Lane::for_priority(Priority::Low), Lane::Cooperative);
        assert_eq!(Lane::for_priority(Priority::Medium), Lane::Cooperative);
        assert_eq!(Lane::for_priority(Priority::High), Lane::ProcessIsolated);
    }

    #[test]
    fn test_request_cancel_is_idempotent() {
        let handle = ExecutionHandle::ProcessIsolated {
            cancel: Arc::new(AtomicBool::new(false)),
            settled: CancellationToken::new(),
        };
        handle.request_cancel();
        handle.request_cancel();
        match &handle {
            ExecutionHandle::ProcessIsolated { cancel, .. } => {
                assert!(cancel.load(Ordering::SeqCst));
            }
            _ => unreachable!(),
        }
    }
}
