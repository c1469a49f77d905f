//! Executor statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::worker_pool::PoolStats;

/// Snapshot of executor activity.
#[derive(Debug, Clone, Default)]
pub struct ExecutorStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks selected by the admission scheduler.
    pub admitted: u64,
    /// Tasks whose callable is executing right now.
    pub running: u64,
    /// Tasks whose callable returned.
    pub completed: u64,
    /// Tasks whose callable panicked.
    pub failed: u64,
    /// Tasks admitted after shutdown and skipped.
    pub skipped: u64,
    /// Tasks cancelled before admission.
    pub cancelled: u64,
    /// Tasks waiting for budget.
    pub pending: usize,
    /// Free budget in units; `None` when unlimited.
    pub available: Option<f64>,
    /// Total budget in units; `None` when unlimited.
    pub capacity: Option<f64>,
    /// Worker pool statistics.
    pub pool: PoolStats,
}

impl ExecutorStats {
    /// Tasks that reached a final state.
    #[must_use]
    pub const fn finished(&self) -> u64 {
        self.completed + self.failed + self.skipped + self.cancelled
    }

    /// Budget currently held by admitted tasks; `None` when unlimited.
    #[must_use]
    pub fn in_use(&self) -> Option<f64> {
        Some(self.capacity? - self.available?)
    }
}

/// Internal counters (lock-free atomics).
#[derive(Debug, Default)]
pub(crate) struct ExecutorCounters {
    pub submitted: AtomicU64,
    pub admitted: AtomicU64,
    pub running: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
    pub cancelled: AtomicU64,
}

impl ExecutorCounters {
    pub fn add(counter: &AtomicU64, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decr(counter: &AtomicU64) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }

    /// Fill the counter fields; ledger and pool fields are left default.
    pub fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            ..ExecutorStats::default()
        }
    }
}
