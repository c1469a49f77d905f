//! Builds named executors from scheduler configuration.

use std::collections::HashMap;

use crate::config::SchedulerConfig;
use crate::core::{ResourceExecutor, SchedulerError};

/// Build one executor per entry of `cfg`, keyed by name.
///
/// Typical use is one executor per resource kind, for example a `"cpu"`
/// executor sized in cores next to a `"gpu"` executor sized in devices.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` naming the first invalid
/// executor, or the error of the first executor that fails to start.
pub fn build_executors(
    cfg: &SchedulerConfig,
) -> Result<HashMap<String, ResourceExecutor>, SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut executors = HashMap::with_capacity(cfg.executors.len());
    for (name, executor_cfg) in &cfg.executors {
        let executor = ResourceExecutor::with_config(
            executor_cfg
                .clone()
                .with_thread_name_prefix(format!("{}-{name}", executor_cfg.thread_name_prefix)),
        )?;
        tracing::debug!(executor = %name, "built executor");
        executors.insert(name.clone(), executor);
    }

    Ok(executors)
}
