//! # Status persistence seam.
//!
//! [`StatusStore`] is the interface to the external task record store. The
//! dispatcher is the **only** actor authorized to drive lifecycle fields
//! through it; everything behind the trait (SQL, pooling, retries) is owned
//! by the collaborating service and out of scope here.
//!
//! [`MemoryStatusStore`] is the in-process implementation used by tests and
//! local runs; it records every transition so ordering can be asserted.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::task::Status;

pub use memory::{MemoryStatusStore, TaskRecord};

/// Lifecycle-field setters on the persisted task record, keyed by task id.
///
/// Failures are reported, never retried here: the dispatcher logs them and
/// proceeds with its own bookkeeping.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Sets the lifecycle status.
    async fn set_status(&self, task_id: i64, status: Status) -> Result<(), StoreError>;

    /// Records when execution started.
    async fn set_started_at(&self, task_id: i64, started_at: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Records when execution finished (any terminal path).
    async fn set_completed_at(
        &self,
        task_id: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Stores the success-path result payload.
    async fn set_result(&self, task_id: i64, result: &str) -> Result<(), StoreError>;

    /// Stores the failure-path error detail.
    async fn set_error_info(&self, task_id: i64, error_info: &str) -> Result<(), StoreError>;
}
