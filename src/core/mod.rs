//! Core scheduling abstractions and budget accounting.

pub mod error;
pub mod executor;
pub mod handle;
pub mod ledger;
pub mod stats;
pub mod worker_pool;

mod binding;
mod request;
mod scheduler;

pub use error::{AppResult, SchedulerError};
pub use executor::{MapResults, ResourceExecutor};
pub use handle::{TaskHandle, TaskOutcome};
pub use ledger::{Cost, ResourceLedger};
pub use request::{RequestState, TaskId};
pub use stats::ExecutorStats;
pub use worker_pool::{PoolError, PoolStats, WorkerPool};
