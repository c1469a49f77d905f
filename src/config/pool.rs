//! Executor and worker pool configuration structures.

use std::collections::HashMap;
use std::env;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, Cost};

/// Ceiling used when no worker-count hint is given: effectively unbounded,
/// so the resource ledger is the only throttle.
pub const UNBOUNDED_WORKERS: usize = usize::MAX;

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_PREFIX: &str = "admission-worker";

/// Environment variable holding the ledger budget.
pub const ENV_AVAILABLE: &str = "ADMISSION_AVAILABLE";
/// Environment variable holding the worker-count hint.
pub const ENV_MAX_WORKERS: &str = "ADMISSION_MAX_WORKERS";
/// Environment variable holding the worker thread name prefix.
pub const ENV_THREAD_PREFIX: &str = "ADMISSION_THREAD_PREFIX";
/// Environment variable toggling cancellation of pending tasks at shutdown.
pub const ENV_CANCEL_PENDING: &str = "ADMISSION_CANCEL_PENDING";

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Maximum number of threads the pool may spawn.
    pub max_workers: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Stack size per worker thread; `None` uses the platform default.
    pub thread_stack_size: Option<usize>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: UNBOUNDED_WORKERS,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.into(),
            thread_stack_size: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Unbounded pool with default thread settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread ceiling.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the per-thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = Some(size);
        self
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }
}

/// Configuration of one resource-budgeted executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Total resource budget; `None` means unlimited.
    pub available: Option<f64>,
    /// Worker-count hint passed to the pool; `None` means unbounded.
    pub max_workers: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Stack size per worker thread.
    pub thread_stack_size: Option<usize>,
    /// Cancel still-queued tasks at shutdown instead of leaving them queued.
    pub cancel_pending_on_shutdown: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            available: None,
            max_workers: None,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.into(),
            thread_stack_size: None,
            cancel_pending_on_shutdown: true,
        }
    }
}

impl ExecutorConfig {
    /// Unlimited budget, unbounded pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Budget sized to the number of logical CPUs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cpu_budget() -> Self {
        Self::new().with_available(num_cpus::get() as f64)
    }

    /// Set a finite budget.
    #[must_use]
    pub const fn with_available(mut self, available: f64) -> Self {
        self.available = Some(available);
        self
    }

    /// Set the worker-count hint.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the per-thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = Some(size);
        self
    }

    /// Choose what shutdown does with tasks still waiting for budget.
    #[must_use]
    pub const fn with_cancel_pending_on_shutdown(mut self, cancel: bool) -> Self {
        self.cancel_pending_on_shutdown = cancel;
        self
    }

    /// Worker pool settings derived from this executor configuration.
    #[must_use]
    pub fn worker_pool(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            max_workers: self.max_workers.unwrap_or(UNBOUNDED_WORKERS),
            thread_name_prefix: self.thread_name_prefix.clone(),
            thread_stack_size: self.thread_stack_size,
        }
    }

    /// Validate executor configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(available) = self.available {
            if Cost::try_from_budget_units(available).is_none() {
                return Err(format!(
                    "available must be a finite, nonnegative number within the ledger range, got {available}"
                ));
            }
        }
        self.worker_pool().validate()
    }

    /// Parse executor configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading a `.env` file first
    /// if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable is set but does not parse, or if the resulting
    /// configuration is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Ok(raw) = env::var(ENV_AVAILABLE) {
            cfg.available = Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{ENV_AVAILABLE}={raw} is not a number"))?,
            );
        }
        if let Ok(raw) = env::var(ENV_MAX_WORKERS) {
            cfg.max_workers = Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{ENV_MAX_WORKERS}={raw} is not a count"))?,
            );
        }
        if let Ok(raw) = env::var(ENV_THREAD_PREFIX) {
            cfg.thread_name_prefix = raw;
        }
        if let Ok(raw) = env::var(ENV_CANCEL_PENDING) {
            cfg.cancel_pending_on_shutdown = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CANCEL_PENDING}={raw} is not a boolean"))?;
        }

        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

/// Root configuration: a set of named executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of executor name to configuration.
    pub executors: HashMap<String, ExecutorConfig>,
}

impl SchedulerConfig {
    /// Validate all executors and ensure at least one exists.
    ///
    /// # Errors
    ///
    /// Returns a description naming the first invalid executor.
    pub fn validate(&self) -> Result<(), String> {
        if self.executors.is_empty() {
            return Err("at least one executor must be defined".into());
        }
        for (name, executor) in &self.executors {
            executor
                .validate()
                .map_err(|e| format!("executor `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unbounded_and_unlimited() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.available, None);
        assert_eq!(cfg.worker_pool().max_workers, UNBOUNDED_WORKERS);
        assert!(cfg.cancel_pending_on_shutdown);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_worker_hint_passes_through() {
        let cfg = ExecutorConfig::new().with_max_workers(3);
        assert_eq!(cfg.worker_pool().max_workers, 3);
    }

    #[test]
    fn test_cpu_budget_is_finite() {
        let cfg = ExecutorConfig::cpu_budget();
        assert!(cfg.available.unwrap() >= 1.0);
    }

    #[test]
    fn test_rejects_negative_budget() {
        assert!(ExecutorConfig::new().with_available(-1.0).validate().is_err());
        assert!(ExecutorConfig::new().with_available(f64::NAN).validate().is_err());
        assert!(ExecutorConfig::new().with_available(0.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_budget_beyond_ledger_range() {
        assert!(ExecutorConfig::new().with_available(1e12).validate().is_ok());
        let err = ExecutorConfig::new()
            .with_available(1e14)
            .validate()
            .unwrap_err();
        assert!(err.contains("ledger range"), "{err}");
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(ExecutorConfig::new().with_max_workers(0).validate().is_err());
        assert!(WorkerPoolConfig::new()
            .with_thread_name_prefix("")
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = ExecutorConfig::from_json_str(r#"{"available": 2.5}"#).unwrap();
        assert_eq!(cfg.available, Some(2.5));
        assert_eq!(cfg.max_workers, None);
        assert_eq!(cfg.thread_name_prefix, DEFAULT_THREAD_PREFIX);
    }
}
