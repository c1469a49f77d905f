//! Resource-budgeted executor: the public submission surface.
//!
//! Every submission becomes an admission request in the pending queue plus
//! a task binding on the worker pool. The binding parks its worker thread
//! until the admission scheduler selects the request, which happens only
//! while the resource ledger has room for its cost.
//!
//! # Example
//!
//! ```rust,no_run
//! use prometheus_admission::config::ExecutorConfig;
//! use prometheus_admission::core::ResourceExecutor;
//!
//! let executor = ResourceExecutor::with_config(ExecutorConfig::new().with_available(2.0))?;
//!
//! // At most two of these run at once.
//! let handles: Vec<_> = (0..4)
//!     .map(|i| executor.submit_with_cost(1.0, move || i * 10))
//!     .collect::<Result<_, _>>()?;
//!
//! for handle in handles {
//!     println!("{:?}", handle.join()?);
//! }
//! executor.shutdown(true);
//! # Ok::<(), prometheus_admission::core::SchedulerError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::ExecutorConfig;
use crate::core::binding::TaskBinding;
use crate::core::error::SchedulerError;
use crate::core::handle::{self, TaskHandle};
use crate::core::ledger::{Cost, ResourceLedger};
use crate::core::request::{AdmissionRequest, TaskId};
use crate::core::scheduler::{admit_ready, cancel_pending, SchedulerState};
use crate::core::stats::{ExecutorCounters, ExecutorStats};
use crate::core::worker_pool::{PoolError, WorkerPool};

/// State shared between the executor and every task binding.
pub(crate) struct Shared {
    /// Ledger and pending queue; the scheduler lock.
    state: Mutex<SchedulerState>,
    /// Fixed at construction, read without the lock.
    unlimited: bool,
    /// Mirrors the scheduler state's flag for lock-free checks on submit.
    /// Set once, while holding the scheduler lock.
    shutdown: AtomicBool,
    cancel_pending_on_shutdown: bool,
    next_id: AtomicU64,
    pub(crate) counters: ExecutorCounters,
}

impl Shared {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Queue a request and run one admission pass.
    fn enqueue(&self, request: Arc<AdmissionRequest>) {
        let mut state = self.state.lock();
        if self.cancel_pending_on_shutdown && self.is_shutdown() {
            // Lost a race with shutdown: the sweep already ran.
            request.cancel();
            ExecutorCounters::incr(&self.counters.cancelled);
            return;
        }
        state.enqueue(request);
        let admitted = admit_ready(&mut state);
        ExecutorCounters::add(&self.counters.admitted, admitted);
    }

    /// Credit a finished request's cost back and run one admission pass.
    pub(crate) fn release(&self, request: &AdmissionRequest) {
        let mut state = self.state.lock();
        state.ledger.release(request.cost());
        let admitted = admit_ready(&mut state);
        ExecutorCounters::add(&self.counters.admitted, admitted);
        debug!(
            task_id = request.id(),
            admitted,
            available = ?state.ledger().available().map(Cost::units),
            "task finished, budget released"
        );
    }
}

/// Executor that admits work only while its resource ledger has headroom.
pub struct ResourceExecutor {
    shared: Arc<Shared>,
    pool: WorkerPool,
}

impl ResourceExecutor {
    /// Create an executor from configuration.
    ///
    /// Without a worker-count hint the pool is effectively unbounded so the
    /// ledger is the only throttle.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is
    /// invalid.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let pool = WorkerPool::new(config.worker_pool()).map_err(|e| match e {
            PoolError::InvalidConfig(msg) => SchedulerError::InvalidConfig(msg),
            other => SchedulerError::Pool(other),
        })?;
        let ledger = ResourceLedger::from_units(config.available);

        info!(
            available = ?config.available,
            max_workers = ?config.max_workers,
            cancel_pending_on_shutdown = config.cancel_pending_on_shutdown,
            "ResourceExecutor initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::new(ledger)),
                unlimited: ledger.is_unlimited(),
                shutdown: AtomicBool::new(false),
                cancel_pending_on_shutdown: config.cancel_pending_on_shutdown,
                next_id: AtomicU64::new(0),
                counters: ExecutorCounters::default(),
            }),
            pool,
        })
    }

    /// Executor with a finite budget of `available` units.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `available` is negative or
    /// not finite.
    pub fn new(available: f64) -> Result<Self, SchedulerError> {
        Self::with_config(ExecutorConfig::new().with_available(available))
    }

    /// Executor with an unlimited budget: a plain unbounded thread pool.
    ///
    /// # Errors
    ///
    /// Only fails if the default configuration is rejected.
    pub fn unlimited() -> Result<Self, SchedulerError> {
        Self::with_config(ExecutorConfig::new())
    }

    /// Submit an unconstrained task. It is admitted immediately and never
    /// touches the ledger.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Shutdown` after `shutdown`
    /// - `SchedulerError::Pool` if a worker thread could not be spawned
    pub fn submit<F, R>(&self, task: F) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_request(None, task)
    }

    /// Submit a task that holds `cost` units of budget while it runs.
    ///
    /// Returns immediately; the task waits on a worker thread until the
    /// ledger can cover its cost.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::Shutdown` after `shutdown`
    /// - `SchedulerError::Pool` if a worker thread could not be spawned
    ///
    /// # Panics
    ///
    /// Panics if the executor has an unlimited ledger, or if `cost` is
    /// negative, NaN or infinite. Both are usage errors.
    pub fn submit_with_cost<F, R>(&self, cost: f64, task: F) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let cost = self.checked_cost(cost);
        self.submit_request(Some(cost), task)
    }

    /// Run `f` over `items` as unconstrained tasks. Results come back in
    /// input order.
    ///
    /// # Errors
    ///
    /// Fails as [`ResourceExecutor::submit`] does, on the first item that
    /// cannot be submitted.
    pub fn map<I, T, F, R>(&self, f: F, items: I) -> Result<MapResults<R>, SchedulerError>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        self.map_request(None, f, items)
    }

    /// Run `f` over `items`, each task holding `cost` units while it runs.
    ///
    /// Every item goes through the same admission path as
    /// [`ResourceExecutor::submit_with_cost`].
    ///
    /// # Errors
    ///
    /// Fails as [`ResourceExecutor::submit_with_cost`] does.
    ///
    /// # Panics
    ///
    /// Same usage errors as [`ResourceExecutor::submit_with_cost`].
    pub fn map_with_cost<I, T, F, R>(
        &self,
        cost: f64,
        f: F,
        items: I,
    ) -> Result<MapResults<R>, SchedulerError>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let cost = self.checked_cost(cost);
        self.map_request(Some(cost), f, items)
    }

    /// Stop accepting work.
    ///
    /// Sets the shutdown flag, then forwards to the worker pool. Tasks admitted
    /// before this call run to completion, even if their worker has not
    /// started them yet. Tasks admitted after this call return without
    /// running their callable and resolve with no value. Tasks still waiting
    /// for budget are cancelled when `cancel_pending_on_shutdown` is set;
    /// otherwise they stay queued, are admitted as budget frees up, and are
    /// skipped. With `wait`, blocks until every worker thread exits, which
    /// never happens for a retained task whose cost exceeds the whole
    /// budget. Calling this twice is the same as calling it once.
    pub fn shutdown(&self, wait: bool) {
        {
            let mut state = self.shared.state.lock();
            if state.begin_shutdown() {
                self.shared.shutdown.store(true, Ordering::Release);
                info!(
                    pending = state.pending_len(),
                    cancel_pending = self.shared.cancel_pending_on_shutdown,
                    "Shutting down resource executor"
                );
                if self.shared.cancel_pending_on_shutdown {
                    let cancelled = cancel_pending(&mut state);
                    ExecutorCounters::add(&self.shared.counters.cancelled, cancelled);
                }
            }
        }
        self.pool.shutdown(wait);
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Snapshot of the ledger.
    #[must_use]
    pub fn ledger(&self) -> ResourceLedger {
        *self.shared.state.lock().ledger()
    }

    /// Snapshot of executor counters, ledger and pool.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        let (pending, ledger) = {
            let state = self.shared.state.lock();
            (state.pending_len(), *state.ledger())
        };
        ExecutorStats {
            pending,
            available: ledger.available().map(Cost::units),
            capacity: ledger.capacity().map(Cost::units),
            pool: self.pool.stats(),
            ..self.shared.counters.snapshot()
        }
    }

    fn checked_cost(&self, cost: f64) -> Cost {
        assert!(
            !self.shared.unlimited,
            "a resource cost requires a finite `available` budget"
        );
        Cost::from_units(cost)
    }

    fn next_id(&self) -> TaskId {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn submit_request<F, R>(&self, cost: Option<Cost>, task: F) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.shared.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }

        let task_id = self.next_id();
        let request = Arc::new(AdmissionRequest::new(task_id, cost));
        let (completer, handle) = handle::channel(Arc::clone(&request));
        let binding = TaskBinding::new(
            Arc::clone(&self.shared),
            Arc::clone(&request),
            task,
            completer,
        );

        // The binding is in place before the request can be admitted; its
        // wait loop tolerates being signalled before it starts waiting.
        self.pool
            .execute(move || binding.run())
            .map_err(|e| match e {
                PoolError::PoolShutdown => SchedulerError::Shutdown,
                other => SchedulerError::Pool(other),
            })?;

        ExecutorCounters::incr(&self.shared.counters.submitted);
        debug!(task_id, cost = ?cost.map(Cost::units), "task submitted");
        self.shared.enqueue(request);
        Ok(handle)
    }

    fn map_request<I, T, F, R>(
        &self,
        cost: Option<Cost>,
        f: F,
        items: I,
    ) -> Result<MapResults<R>, SchedulerError>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let f = Arc::new(f);
        let handles = items
            .into_iter()
            .map(|item| {
                let f = Arc::clone(&f);
                self.submit_request(cost, move || f(item))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MapResults {
            handles: handles.into_iter(),
        })
    }
}

impl fmt::Debug for ResourceExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceExecutor")
            .field("stats", &self.stats())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// Results of [`ResourceExecutor::map`], yielded in input order.
///
/// Each `next` blocks until the corresponding task finishes.
pub struct MapResults<R> {
    handles: std::vec::IntoIter<TaskHandle<R>>,
}

impl<R> Iterator for MapResults<R> {
    type Item = Result<Option<R>, SchedulerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.handles.next().map(TaskHandle::join)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.handles.size_hint()
    }
}

impl<R> ExactSizeIterator for MapResults<R> {}

impl<R> fmt::Debug for MapResults<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapResults")
            .field("remaining", &self.handles.len())
            .finish()
    }
}
