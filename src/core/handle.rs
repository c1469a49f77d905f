//! Result handles returned by task submission.
//!
//! A [`TaskHandle`] is the caller's side of a one-shot slot; the task binding
//! holds the matching `Completer`. The slot pairs a `parking_lot::Mutex`
//! with a `Condvar`, the same way the worker pool's result storage does, so
//! waiting never polls.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::error::SchedulerError;
use crate::core::request::{AdmissionRequest, RequestState, TaskId};

/// Final outcome of a submitted task.
pub enum TaskOutcome<R> {
    /// The callable ran and returned a value.
    Completed(R),
    /// The callable panicked with the given message.
    Panicked(String),
    /// The task was admitted after shutdown and its callable never ran.
    SkippedOnShutdown,
    /// The task never got admitted.
    Cancelled,
}

impl<R> TaskOutcome<R> {
    /// Collapse the outcome into the value seen by `join`.
    ///
    /// A skipped task yields `Ok(None)`: no value and no error.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::TaskPanicked` if the callable panicked
    /// - `SchedulerError::Cancelled` if the task was never admitted
    pub fn into_result(self) -> Result<Option<R>, SchedulerError> {
        match self {
            Self::Completed(value) => Ok(Some(value)),
            Self::SkippedOnShutdown => Ok(None),
            Self::Panicked(msg) => Err(SchedulerError::TaskPanicked(msg)),
            Self::Cancelled => Err(SchedulerError::Cancelled),
        }
    }

    /// Whether the callable returned normally.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl<R> fmt::Debug for TaskOutcome<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(_) => f.write_str("Completed(..)"),
            Self::Panicked(msg) => f.debug_tuple("Panicked").field(msg).finish(),
            Self::SkippedOnShutdown => f.write_str("SkippedOnShutdown"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

enum SlotState<R> {
    Pending,
    Ready(TaskOutcome<R>),
}

struct Slot<R> {
    state: Mutex<SlotState<R>>,
    ready: Condvar,
}

/// Create a connected completer/handle pair for `request`.
pub(crate) fn channel<R>(request: Arc<AdmissionRequest>) -> (Completer<R>, TaskHandle<R>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        ready: Condvar::new(),
    });
    (
        Completer {
            slot: Some(Arc::clone(&slot)),
        },
        TaskHandle { request, slot },
    )
}

/// Producer side of a result slot.
///
/// Dropping a completer without calling `Completer::complete` resolves the
/// handle as cancelled, so no caller waits forever on a discarded job.
pub(crate) struct Completer<R> {
    slot: Option<Arc<Slot<R>>>,
}

impl<R> Completer<R> {
    pub(crate) fn complete(mut self, outcome: TaskOutcome<R>) {
        if let Some(slot) = self.slot.take() {
            resolve(&slot, outcome);
        }
    }
}

impl<R> Drop for Completer<R> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            resolve(&slot, TaskOutcome::Cancelled);
        }
    }
}

fn resolve<R>(slot: &Slot<R>, outcome: TaskOutcome<R>) {
    let mut state = slot.state.lock();
    *state = SlotState::Ready(outcome);
    slot.ready.notify_all();
}

/// Caller's handle on a submitted task.
pub struct TaskHandle<R> {
    request: Arc<AdmissionRequest>,
    slot: Arc<Slot<R>>,
}

impl<R> TaskHandle<R> {
    /// Identifier assigned at submission.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.request.id()
    }

    /// Where the task is in its lifecycle: queued for budget, admitted,
    /// running or finished.
    ///
    /// The state can move on as soon as it is read. Use [`TaskHandle::wait`]
    /// or [`TaskHandle::join`] to wait for the outcome.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.request.state()
    }

    /// Whether the outcome is available without blocking.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Ready(_))
    }

    /// Block until the task has an outcome.
    pub fn wait(&self) {
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Pending) {
            self.slot.ready.wait(&mut state);
        }
    }

    /// Block until the task has an outcome or `timeout` elapses. Returns
    /// whether the outcome is available.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Pending) {
            if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
                return !matches!(*state, SlotState::Pending);
            }
        }
        true
    }

    /// Block until the task finishes and take its outcome.
    #[must_use]
    pub fn outcome(self) -> TaskOutcome<R> {
        let mut state = self.slot.state.lock();
        while matches!(*state, SlotState::Pending) {
            self.slot.ready.wait(&mut state);
        }
        match std::mem::replace(&mut *state, SlotState::Pending) {
            SlotState::Ready(outcome) => outcome,
            SlotState::Pending => unreachable!("slot observed ready"),
        }
    }

    /// Block until the task finishes and return its value.
    ///
    /// Returns `Ok(None)` for a task that was admitted after shutdown and
    /// therefore never ran.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::TaskPanicked` if the callable panicked
    /// - `SchedulerError::Cancelled` if the task was never admitted
    pub fn join(self) -> Result<Option<R>, SchedulerError> {
        self.outcome().into_result()
    }

    /// Like [`TaskHandle::join`] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Timeout` if no outcome arrived in time, otherwise as
    /// for [`TaskHandle::join`].
    pub fn join_timeout(self, timeout: Duration) -> Result<Option<R>, SchedulerError> {
        if !self.wait_timeout(timeout) {
            return Err(SchedulerError::Timeout);
        }
        self.join()
    }
}

#[cfg(feature = "tokio-runtime")]
impl<R: Send + 'static> TaskHandle<R> {
    /// Await the task from async code.
    ///
    /// The blocking wait moves onto tokio's blocking thread pool so the
    /// calling runtime is never stalled.
    ///
    /// # Errors
    ///
    /// As for [`TaskHandle::join`]; a failed blocking task maps to
    /// `SchedulerError::Cancelled`.
    pub async fn join_async(self) -> Result<Option<R>, SchedulerError> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .unwrap_or(Err(SchedulerError::Cancelled))
    }

    /// Await the task with a timeout.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Timeout` if the outcome did not arrive in time,
    /// otherwise as for [`TaskHandle::join_async`].
    pub async fn join_async_timeout(
        self,
        timeout: Duration,
    ) -> Result<Option<R>, SchedulerError> {
        match tokio::time::timeout(timeout, self.join_async()).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::Timeout),
        }
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("finished", &self.is_finished())
            .finish()
    }
}
