//! Configuration models for executors and worker pools.

pub mod pool;

pub use pool::{ExecutorConfig, SchedulerConfig, WorkerPoolConfig, UNBOUNDED_WORKERS};
