//! Admission requests and their one-shot admission signal.

use parking_lot::{Condvar, Mutex};

use crate::core::ledger::Cost;

/// Identifier assigned to each submitted task, unique per executor.
pub type TaskId = u64;

/// Lifecycle of a single admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting in the pending queue.
    Queued,
    /// Selected by the admission scheduler; budget has been debited.
    Admitted,
    /// The user callable is executing.
    Running,
    /// The callable returned a value.
    Completed,
    /// The callable panicked.
    Failed,
    /// Admitted after shutdown; the callable is never invoked. Set by the
    /// scheduler at admission time, so work admitted before shutdown always
    /// runs.
    SkippedOnShutdown,
    /// Removed from the pending queue at shutdown without being admitted.
    Cancelled,
}

impl RequestState {
    /// Whether the request has left the queue (admitted or cancelled).
    #[must_use]
    pub const fn is_released(self) -> bool {
        !matches!(self, Self::Queued)
    }

    /// Whether the request reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::SkippedOnShutdown | Self::Cancelled
        )
    }
}

/// Latch plus condition variable guarding the Queued → Admitted transition.
///
/// The latch is set only by the scheduler while it holds the scheduler lock.
/// The waiter re-checks the latch under the signal's own mutex before every
/// wait, so a notification that lands before the waiter arrives is never
/// lost.
#[derive(Debug)]
pub(crate) struct AdmissionSignal {
    state: Mutex<RequestState>,
    cvar: Condvar,
}

impl AdmissionSignal {
    fn new() -> Self {
        Self {
            state: Mutex::new(RequestState::Queued),
            cvar: Condvar::new(),
        }
    }

    /// Move from `Queued` to `to` and wake the waiter.
    fn release(&self, to: RequestState) {
        let mut state = self.state.lock();
        assert_eq!(
            *state,
            RequestState::Queued,
            "admission signal released twice"
        );
        *state = to;
        self.cvar.notify_one();
    }

    /// Block until the request leaves the queue; returns the state it left in.
    fn wait_released(&self) -> RequestState {
        let mut state = self.state.lock();
        while !state.is_released() {
            self.cvar.wait(&mut state);
        }
        *state
    }

    fn set(&self, to: RequestState) {
        *self.state.lock() = to;
    }

    fn get(&self) -> RequestState {
        *self.state.lock()
    }
}

/// A unit of work waiting for budget.
///
/// Requests live in the pending queue behind an `Arc` and are removed by
/// scan selection, never by comparing values.
#[derive(Debug)]
pub struct AdmissionRequest {
    id: TaskId,
    cost: Option<Cost>,
    signal: AdmissionSignal,
}

impl AdmissionRequest {
    pub(crate) fn new(id: TaskId, cost: Option<Cost>) -> Self {
        Self {
            id,
            cost,
            signal: AdmissionSignal::new(),
        }
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Declared cost; `None` for unconstrained work.
    #[must_use]
    pub const fn cost(&self) -> Option<Cost> {
        self.cost
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.signal.get()
    }

    /// Mark admitted and wake the bound task. Caller holds the scheduler lock.
    pub(crate) fn admit(&self) {
        self.signal.release(RequestState::Admitted);
    }

    /// Admit with the budget debited but the callable to be skipped, because
    /// shutdown had already begun. Caller holds the scheduler lock.
    pub(crate) fn admit_skipped(&self) {
        self.signal.release(RequestState::SkippedOnShutdown);
    }

    /// Mark cancelled and wake the bound task. Caller holds the scheduler lock.
    pub(crate) fn cancel(&self) {
        self.signal.release(RequestState::Cancelled);
    }

    pub(crate) fn wait_for_admission(&self) -> RequestState {
        self.signal.wait_released()
    }

    pub(crate) fn transition(&self, to: RequestState) {
        self.signal.set(to);
    }
}
