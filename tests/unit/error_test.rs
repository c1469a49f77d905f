//! Tests for error types

use prometheus_admission::core::{PoolError, SchedulerError};

#[test]
fn test_shutdown_error() {
    assert_eq!(SchedulerError::Shutdown.to_string(), "executor has been shut down");
}

#[test]
fn test_cancelled_error() {
    assert_eq!(SchedulerError::Cancelled.to_string(), "task cancelled before admission");
}

#[test]
fn test_task_panicked_error() {
    let err = SchedulerError::TaskPanicked("oom".to_string());
    assert_eq!(format!("{}", err), "task panicked: oom");
}

#[test]
fn test_pool_error_converts() {
    let err: SchedulerError = PoolError::Internal("spawn failed".into()).into();
    assert_eq!(err.to_string(), "worker pool error: internal error: spawn failed");
}
