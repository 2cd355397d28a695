//! # In-memory status store.
//!
//! Keeps task records in a map and remembers the full ordered list of status
//! transitions per id, which is what the dispatcher tests assert on (e.g.
//! "exactly one `IN_PROGRESS → COMPLETED` sequence, never a write after a
//! terminal status").

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::store::StatusStore;
use crate::task::Status;

/// Snapshot of one task's persisted lifecycle fields.
#[derive(Clone, Debug, Default)]
pub struct TaskRecord {
    pub status: Option<Status>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error_info: Option<String>,
}

/// Map-backed [`StatusStore`] with a per-id transition history.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<i64, TaskRecord>>,
    transitions: Mutex<HashMap<i64, Vec<Status>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the record for `task_id`, if any field was set.
    pub fn record(&self, task_id: i64) -> Option<TaskRecord> {
        lock(&self.records).get(&task_id).cloned()
    }

    /// Returns every status transition recorded for `task_id`, in order.
    pub fn transitions(&self, task_id: i64) -> Vec<Status> {
        lock(&self.transitions)
            .get(&task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// True when no record was ever touched.
    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    fn with_record(&self, task_id: i64, f: impl FnOnce(&mut TaskRecord)) {
        let mut records = lock(&self.records);
        f(records.entry(task_id).or_default());
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn set_status(&self, task_id: i64, status: Status) -> Result<(), StoreError> {
        self.with_record(task_id, |r| r.status = Some(status));
        lock(&self.transitions)
            .entry(task_id)
            .or_default()
            .push(status);
        Ok(())
    }

    async fn set_started_at(
        &self,
        task_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_record(task_id, |r| r.started_at = Some(started_at));
        Ok(())
    }

    async fn set_completed_at(
        &self,
        task_id: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_record(task_id, |r| r.completed_at = Some(completed_at));
        Ok(())
    }

    async fn set_result(&self, task_id: i64, result: &str) -> Result<(), StoreError> {
        self.with_record(task_id, |r| r.result = Some(result.to_string()));
        Ok(())
    }

    async fn set_error_info(&self, task_id: i64, error_info: &str) -> Result<(), StoreError> {
        self.with_record(task_id, |r| r.error_info = Some(error_info.to_string()));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
