//! Error types used by the taskpilot runtime.
//!
//! This module defines four error enums, one per failure domain:
//!
//! - [`BrokerError`] — failures talking to the message broker (pools, channels, publish).
//! - [`DispatchError`] — failures inside the dispatcher and its worker-process pool.
//! - [`StoreError`] — failures reported by the external status store.
//! - [`RuntimeError`] — top-level failures of the worker application.
//!
//! All types provide `as_label()` for stable snake_case labels in logs.

use thiserror::Error;

/// # Errors raised by the broker layer.
///
/// Connection/channel pool errors are surfaced to the caller of the failed
/// acquisition; the pools replace broken connections transparently on the
/// *next* acquisition, so these are per-operation failures, not fatal ones.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Protocol-level AMQP failure (declare, bind, publish, consume, ack).
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Failure acquiring or building a connection/channel pool.
    #[error("broker pool error: {0}")]
    Pool(String),

    /// Message body could not be JSON-encoded for publishing.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BrokerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::Amqp(_) => "broker_amqp",
            BrokerError::Pool(_) => "broker_pool",
            BrokerError::Encode(_) => "broker_encode",
        }
    }
}

impl From<deadpool_lapin::PoolError> for BrokerError {
    fn from(err: deadpool_lapin::PoolError) -> Self {
        BrokerError::Pool(err.to_string())
    }
}

impl From<deadpool::managed::PoolError<BrokerError>> for BrokerError {
    fn from(err: deadpool::managed::PoolError<BrokerError>) -> Self {
        match err {
            deadpool::managed::PoolError::Backend(e) => e,
            other => BrokerError::Pool(other.to_string()),
        }
    }
}

/// # Errors raised by the dispatching core.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The worker-process pool has been shut down; no further submissions.
    #[error("worker pool is shut down")]
    PoolClosed,

    /// A pool management thread could not be started.
    #[error("worker pool thread failed to start: {0}")]
    PoolSpawn(String),
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::PoolClosed => "pool_closed",
            DispatchError::PoolSpawn(_) => "pool_spawn",
        }
    }
}

/// # Error reported by the external status store.
///
/// The store is an external collaborator; its failures carry an opaque
/// message. The dispatcher logs these and proceeds — a persistence failure
/// never wedges dispatcher bookkeeping.
#[derive(Error, Debug)]
#[error("status store failure: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Builds a store error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        StoreError(cause.to_string())
    }
}

/// # Errors produced by the worker application itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Broker setup or consumption failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Dispatcher construction failed (worker pool could not start).
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// OS-level failure: signal handler registration or worker binary lookup.
    #[error("os error: {0}")]
    Os(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Broker(_) => "runtime_broker",
            RuntimeError::Dispatch(_) => "runtime_dispatch",
            RuntimeError::Os(_) => "runtime_os",
        }
    }
}
