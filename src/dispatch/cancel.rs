//! # Cancel-flag registry shared across the process boundary.
//!
//! The pool's management threads cannot hold the dispatcher's async state,
//! so process-isolated cancellation goes through this registry: the
//! dispatcher registers a flag per task id, the pool thread watches it and
//! relays a raised flag to the child over stdin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared map of task id → cancel flag. Cheap to clone.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    flags: Arc<Mutex<HashMap<i64, Arc<AtomicBool>>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh flag for `task_id` and returns it. Registering an
    /// existing id replaces its flag.
    pub fn register(&self, task_id: i64) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.lock().insert(task_id, Arc::clone(&flag));
        flag
    }

    /// Raises the flag for `task_id`, if registered. Idempotent.
    pub fn request(&self, task_id: i64) {
        if let Some(flag) = self.lock().get(&task_id) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// True when the flag for `task_id` is registered and raised.
    pub fn is_requested(&self, task_id: i64) -> bool {
        self.lock()
            .get(&task_id)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Drops the flag for `task_id` once the task has settled.
    pub fn remove(&self, task_id: i64) {
        self.lock().remove(&task_id);
    }

    /// True when no task is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<AtomicBool>>> {
        self.flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_remove() {
        let registry = CancelRegistry::new();
        let flag = registry.register(1);
        assert!(!registry.is_requested(1));

        registry.request(1);
        assert!(registry.is_requested(1));
        assert!(flag.load(Ordering::SeqCst));

        registry.remove(1);
        assert!(!registry.is_requested(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_request_unknown_id_is_noop() {
        let registry = CancelRegistry::new();
        registry.request(42);
        assert!(!registry.is_requested(42));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = CancelRegistry::new();
        let other = registry.clone();
        registry.register(7);
        other.request(7);
        assert!(registry.is_requested(7));
    }
}
