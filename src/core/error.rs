//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::worker_pool::PoolError;

/// Errors produced by the admission scheduler and its result handles.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The executor has been shut down and accepts no new work.
    #[error("executor has been shut down")]
    Shutdown,
    /// The task was removed from the pending queue before it was admitted.
    #[error("task cancelled before admission")]
    Cancelled,
    /// The task's callable panicked; carries the panic message.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    /// A bounded wait for a result elapsed.
    #[error("timed out waiting for task result")]
    Timeout,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The underlying worker pool refused or failed the dispatch.
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
