//! Tests for executor builders

use std::collections::HashMap;

use prometheus_admission::builders::build_executors;
use prometheus_admission::config::{ExecutorConfig, SchedulerConfig};

#[test]
fn test_build_executors() {
    let mut executors = HashMap::new();
    executors.insert("cpu".to_string(), ExecutorConfig::new().with_available(2.0));
    executors.insert("io".to_string(), ExecutorConfig::new());
    let cfg = SchedulerConfig { executors };

    let built = build_executors(&cfg).unwrap();
    assert_eq!(built.len(), 2);

    let cpu = &built["cpu"];
    assert_eq!(cpu.stats().capacity, Some(2.0));
    let handle = cpu
        .submit_with_cost(1.0, || std::thread::current().name().map(str::to_owned))
        .unwrap();
    let name = handle.join().unwrap().flatten().unwrap();
    assert!(name.starts_with("admission-worker-cpu-"), "{name}");

    assert!(built["io"].ledger().is_unlimited());
    for executor in built.values() {
        executor.shutdown(true);
    }
}

#[test]
fn test_build_executors_rejects_invalid() {
    let mut executors = HashMap::new();
    executors.insert("bad".to_string(), ExecutorConfig::new().with_max_workers(0));
    let cfg = SchedulerConfig { executors };
    assert!(build_executors(&cfg).is_err());
}
