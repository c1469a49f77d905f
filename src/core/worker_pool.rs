//! Worker pool backed by dedicated OS threads.
//!
//! Jobs travel over an unbounded `crossbeam-channel`. Threads are spawned
//! lazily: a job first claims an idle worker, and only if none is idle and
//! the pool is below its `max_workers` ceiling is a new thread started. The
//! default ceiling is effectively unbounded, because the admission scheduler
//! parks jobs on worker threads while they wait for budget; a small ceiling
//! would let waiting jobs occupy every thread while admitted ones starve.
//!
//! # Design Principles
//!
//! - **No polling**: idle workers block on `recv`
//! - **Lock-free fast path**: idle accounting and counters are atomics
//! - **Clean shutdown**: dropping the sender lets workers drain and exit

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The pool has been shut down.
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// Internal error (thread spawn failure, channel closed, etc.).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Threads spawned so far.
    pub worker_count: usize,

    /// Threads waiting for a job.
    pub idle_workers: usize,

    /// Jobs currently executing (including jobs parked on admission).
    pub active_jobs: u64,

    /// Jobs sent but not yet picked up.
    pub queued_jobs: u64,

    /// Jobs that returned.
    pub completed_jobs: u64,

    /// Jobs that unwound out of the worker.
    pub panicked_jobs: u64,

    /// Jobs accepted by `execute`.
    pub submitted_jobs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    spawned_workers: AtomicUsize,
    active_jobs: AtomicU64,
    queued_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    panicked_jobs: AtomicU64,
    submitted_jobs: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, idle_workers: usize) -> PoolStats {
        PoolStats {
            worker_count: self.spawned_workers.load(Ordering::Relaxed),
            idle_workers,
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            panicked_jobs: self.panicked_jobs.load(Ordering::Relaxed),
            submitted_jobs: self.submitted_jobs.load(Ordering::Relaxed),
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread pool that grows on demand up to `max_workers` threads.
pub struct WorkerPool {
    /// Pool configuration.
    config: WorkerPoolConfig,

    /// Job sender. `None` once shut down.
    job_tx: Mutex<Option<Sender<Job>>>,

    /// Kept so that lazily spawned workers can share the queue.
    job_rx: Receiver<Job>,

    /// Workers parked on `recv` that no job has claimed yet.
    idle: Arc<AtomicUsize>,

    /// Pool statistics counters.
    counters: Arc<PoolCounters>,

    /// Shutdown flag.
    shutdown: AtomicBool,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create an empty pool. No thread is spawned until the first job.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = unbounded::<Job>();

        debug!(
            max_workers = config.max_workers,
            thread_name_prefix = %config.thread_name_prefix,
            "WorkerPool initialized with lazily spawned OS threads"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            job_rx,
            idle: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(PoolCounters::default()),
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Run `job` on a worker thread.
    ///
    /// Never blocks on the job itself. If every thread is busy and the pool
    /// is at its ceiling, the job waits in the channel for the next free
    /// worker.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolShutdown` if the pool has been shut down
    /// - `PoolError::Internal` if a needed worker thread could not be spawned
    pub fn execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let job_tx = self.job_tx.lock();
        let Some(tx) = job_tx.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        if !self.claim_idle_worker() {
            self.grow()?;
        }

        tx.send(Box::new(job))
            .map_err(|_| PoolError::Internal("job channel disconnected".into()))?;
        self.counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);
        self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn claim_idle_worker(&self) -> bool {
        self.idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Spawn one more worker unless the ceiling is reached.
    fn grow(&self) -> Result<(), PoolError> {
        let mut workers = self.workers.lock();
        let worker_id = self.counters.spawned_workers.load(Ordering::Relaxed);
        if worker_id >= self.config.max_workers {
            return Ok(());
        }
        let handle = spawn_worker(
            worker_id,
            self.job_rx.clone(),
            Arc::clone(&self.idle),
            Arc::clone(&self.counters),
            &self.config,
        )
        .map_err(|e| {
            error!(worker_id, error = %e, "Failed to spawn worker thread");
            PoolError::Internal(format!("failed to spawn worker thread: {e}"))
        })?;
        workers.push(handle);
        self.counters.spawned_workers.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.idle.load(Ordering::Relaxed))
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting jobs. Jobs already sent still run.
    ///
    /// With `wait`, blocks until every worker thread has drained the queue
    /// and exited. A worker calling this on its own pool is never joined
    /// with itself. Calling it again is harmless.
    pub fn shutdown(&self, wait: bool) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            info!("Shutting down worker pool");
            // Dropping the sender unblocks every worker once the queue is empty.
            *self.job_tx.lock() = None;
        }

        if !wait {
            return;
        }

        let current = thread::current().id();
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let worker_count = handles.len();
        for (idx, handle) in handles.into_iter().enumerate() {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(worker_id = idx, "Worker panicked");
            } else {
                debug!(worker_id = idx, "Worker joined successfully");
            }
        }
        info!(worker_count, "Worker pool shut down complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join; explicit shutdown(true) is required
        // for a graceful wait.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            *self.job_tx.lock() = None;
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    job_rx: Receiver<Job>,
    idle: Arc<AtomicUsize>,
    counters: Arc<PoolCounters>,
    config: &WorkerPoolConfig,
) -> std::io::Result<JoinHandle<()>> {
    let mut builder =
        thread::Builder::new().name(format!("{}-{worker_id}", config.thread_name_prefix));
    if let Some(stack_size) = config.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    builder.spawn(move || {
        debug!(worker_id, "Worker thread started");

        // A fresh worker was spawned for a specific job, so it does not count
        // itself idle until that job is done.
        while let Ok(job) = job_rx.recv() {
            counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
            counters.active_jobs.fetch_add(1, Ordering::Relaxed);

            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(worker_id, "Job unwound out of worker");
                counters.panicked_jobs.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }

            counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
            idle.fetch_add(1, Ordering::AcqRel);
        }

        debug!(worker_id, "Worker channel closed, exiting");
    })
}
