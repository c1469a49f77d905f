//! Tests for configuration validation

use prometheus_admission::config::pool::{
    ENV_AVAILABLE, ENV_CANCEL_PENDING, ENV_MAX_WORKERS, ENV_THREAD_PREFIX,
};
use prometheus_admission::config::{ExecutorConfig, SchedulerConfig, WorkerPoolConfig, UNBOUNDED_WORKERS};

/// Serializes tests that mutate the process environment.
static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

const ENV_VARS: [&str; 4] = [
    ENV_AVAILABLE,
    ENV_MAX_WORKERS,
    ENV_THREAD_PREFIX,
    ENV_CANCEL_PENDING,
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn test_executor_config_validation() {
    let valid = ExecutorConfig::new()
        .with_available(4.0)
        .with_max_workers(16)
        .with_thread_name_prefix("gpu");
    assert!(valid.validate().is_ok());
    assert_eq!(valid.worker_pool().thread_name_prefix, "gpu");
}

#[test]
fn test_executor_config_invalid_available() {
    let invalid = ExecutorConfig::new().with_available(f64::INFINITY);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_stack() {
    let invalid = WorkerPoolConfig::new().with_thread_stack_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_default_unbounded() {
    assert_eq!(WorkerPoolConfig::default().max_workers, UNBOUNDED_WORKERS);
}

#[test]
fn test_scheduler_config_empty_executors() {
    let config = SchedulerConfig {
        executors: std::collections::HashMap::new(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "executors": {
            "cpu": {
                "available": 8.0,
                "thread_name_prefix": "cpu-worker"
            },
            "io": {}
        }
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.executors["cpu"].available, Some(8.0));
    assert_eq!(config.executors["io"].available, None);
    assert!(config.executors["io"].cancel_pending_on_shutdown);
}

#[test]
fn test_scheduler_config_from_json_names_bad_executor() {
    let json = r#"{ "executors": { "broken": { "available": -1.0 } } }"#;
    let err = SchedulerConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("broken"), "{err}");
}

#[test]
fn test_executor_config_from_json_parse_error() {
    let err = ExecutorConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_executor_config_from_env() {
    let _guard = ENV_LOCK.lock();
    clear_env();
    std::env::set_var(ENV_AVAILABLE, " 3.5 ");
    std::env::set_var(ENV_MAX_WORKERS, "12");
    std::env::set_var(ENV_THREAD_PREFIX, "env-worker");
    std::env::set_var(ENV_CANCEL_PENDING, "false");

    let result = ExecutorConfig::from_env();
    clear_env();

    let cfg = result.expect("valid environment should parse");
    assert_eq!(cfg.available, Some(3.5));
    assert_eq!(cfg.max_workers, Some(12));
    assert_eq!(cfg.thread_name_prefix, "env-worker");
    assert!(!cfg.cancel_pending_on_shutdown);
}

#[test]
fn test_executor_config_from_env_defaults() {
    let _guard = ENV_LOCK.lock();
    clear_env();

    let cfg = ExecutorConfig::from_env().unwrap();
    assert_eq!(cfg, ExecutorConfig::default());
}

#[test]
fn test_executor_config_from_env_unparseable() {
    let _guard = ENV_LOCK.lock();
    clear_env();
    std::env::set_var(ENV_AVAILABLE, "two");
    let bad_number = ExecutorConfig::from_env();
    clear_env();
    std::env::set_var(ENV_CANCEL_PENDING, "sometimes");
    let bad_bool = ExecutorConfig::from_env();
    clear_env();

    let err = bad_number.unwrap_err();
    assert!(
        format!("{err:#}").contains("ADMISSION_AVAILABLE=two is not a number"),
        "{err:#}"
    );
    let err = bad_bool.unwrap_err();
    assert!(format!("{err}").contains("is not a boolean"), "{err}");
}

#[test]
fn test_executor_config_from_env_invalid_value() {
    let _guard = ENV_LOCK.lock();
    clear_env();
    std::env::set_var(ENV_MAX_WORKERS, "0");
    let result = ExecutorConfig::from_env();
    clear_env();

    assert!(result.is_err());
}
