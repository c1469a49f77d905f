//! Admission scheduler: the greedy scan over the pending queue.
//!
//! All state here sits behind the executor's single scheduler lock. The
//! functions take `&mut SchedulerState`, which can only be reached through
//! that lock's guard, so running a pass without the lock does not compile.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::ledger::{Cost, ResourceLedger};
use crate::core::request::AdmissionRequest;

/// Ledger and pending queue, guarded together by the scheduler lock.
#[derive(Debug)]
pub struct SchedulerState {
    pub(crate) ledger: ResourceLedger,
    pub(crate) pending: VecDeque<Arc<AdmissionRequest>>,
    /// Requests admitted once this is set skip their callable.
    shutting_down: bool,
}

impl SchedulerState {
    /// Empty queue over the given ledger.
    #[must_use]
    pub const fn new(ledger: ResourceLedger) -> Self {
        Self {
            ledger,
            pending: VecDeque::new(),
            shutting_down: false,
        }
    }

    /// Record that shutdown has begun. Returns `false` if it already had.
    pub(crate) fn begin_shutdown(&mut self) -> bool {
        !std::mem::replace(&mut self.shutting_down, true)
    }

    /// Current ledger.
    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Number of requests still waiting for budget.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append a request in submission order.
    pub(crate) fn enqueue(&mut self, request: Arc<AdmissionRequest>) {
        self.pending.push_back(request);
    }
}

/// Admit every pending request that fits, front to back.
///
/// A request that does not fit stays queued but does not stop the scan, so a
/// later, cheaper request can overtake it. Selected requests leave the queue
/// in one batch and are then signalled, still under the lock. Once shutdown
/// has begun, selected requests are admitted as skipped: their budget is
/// debited and returned as usual but the callable never runs. Returns the
/// number admitted.
pub(crate) fn admit_ready(state: &mut SchedulerState) -> usize {
    let mut admitted = Vec::new();
    let ledger = &mut state.ledger;
    state.pending.retain(|request| {
        if ledger.try_reserve(request.cost()) {
            admitted.push(Arc::clone(request));
            false
        } else {
            true
        }
    });

    for request in &admitted {
        debug!(
            task_id = request.id(),
            cost = ?request.cost().map(Cost::units),
            available = ?state.ledger.available().map(Cost::units),
            skip = state.shutting_down,
            "admitting task"
        );
        if state.shutting_down {
            request.admit_skipped();
        } else {
            request.admit();
        }
    }
    admitted.len()
}

/// Drain the pending queue, cancelling every request in it.
///
/// Cancelled requests were never debited, so the ledger is untouched.
pub(crate) fn cancel_pending(state: &mut SchedulerState) -> usize {
    let cancelled = state.pending.len();
    for request in state.pending.drain(..) {
        request.cancel();
    }
    if cancelled > 0 {
        warn!(cancelled, "cancelled pending tasks at shutdown");
    }
    cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::RequestState;

    fn request(id: u64, cost: Option<f64>) -> Arc<AdmissionRequest> {
        Arc::new(AdmissionRequest::new(id, cost.map(Cost::from_units)))
    }

    fn finite(units: f64) -> SchedulerState {
        SchedulerState::new(ResourceLedger::from_units(Some(units)))
    }

    #[test]
    fn test_admits_in_order_until_budget_exhausted() {
        let mut state = finite(2.0);
        let reqs: Vec<_> = (0..4).map(|i| request(i, Some(1.0))).collect();
        for r in &reqs {
            state.enqueue(Arc::clone(r));
        }

        assert_eq!(admit_ready(&mut state), 2);
        assert_eq!(reqs[0].state(), RequestState::Admitted);
        assert_eq!(reqs[1].state(), RequestState::Admitted);
        assert_eq!(reqs[2].state(), RequestState::Queued);
        assert_eq!(state.pending_len(), 2);
        assert_eq!(state.ledger().available(), Some(Cost::ZERO));

        // Nothing changed, nothing more fits.
        assert_eq!(admit_ready(&mut state), 0);
    }

    #[test]
    fn test_scan_skips_expensive_head() {
        let mut state = finite(1.0);
        let big = request(0, Some(2.0));
        let small = request(1, Some(0.5));
        let smaller = request(2, Some(0.5));
        state.enqueue(Arc::clone(&big));
        state.enqueue(Arc::clone(&small));
        state.enqueue(Arc::clone(&smaller));

        assert_eq!(admit_ready(&mut state), 2);
        assert_eq!(big.state(), RequestState::Queued);
        assert_eq!(small.state(), RequestState::Admitted);
        assert_eq!(smaller.state(), RequestState::Admitted);
        assert_eq!(state.pending.front().map(|r| r.id()), Some(0));
    }

    #[test]
    fn test_unconstrained_always_admitted() {
        let mut state = finite(0.0);
        let free = request(0, None);
        let zero = request(1, Some(0.0));
        let paid = request(2, Some(0.1));
        state.enqueue(Arc::clone(&free));
        state.enqueue(Arc::clone(&zero));
        state.enqueue(Arc::clone(&paid));

        assert_eq!(admit_ready(&mut state), 2);
        assert_eq!(paid.state(), RequestState::Queued);
    }

    #[test]
    fn test_unlimited_admits_everything() {
        let mut state = SchedulerState::new(ResourceLedger::unlimited());
        for i in 0..10 {
            state.enqueue(request(i, None));
        }
        assert_eq!(admit_ready(&mut state), 10);
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.ledger(), &ResourceLedger::Unlimited);
    }

    #[test]
    fn test_release_then_rescan_compounds() {
        let mut state = finite(1.0);
        let running = request(0, Some(1.0));
        state.enqueue(Arc::clone(&running));
        assert_eq!(admit_ready(&mut state), 1);

        let waiting: Vec<_> = (1..=4).map(|i| request(i, Some(0.25))).collect();
        for r in &waiting {
            state.enqueue(Arc::clone(r));
        }
        assert_eq!(admit_ready(&mut state), 0);

        state.ledger.release(running.cost());
        assert_eq!(admit_ready(&mut state), 4);
        assert!(waiting.iter().all(|r| r.state() == RequestState::Admitted));
    }

    #[test]
    fn test_cancel_pending_leaves_ledger_alone() {
        let mut state = finite(1.0);
        let held = request(0, Some(1.0));
        let queued = request(1, Some(1.0));
        state.enqueue(Arc::clone(&held));
        state.enqueue(Arc::clone(&queued));
        assert_eq!(admit_ready(&mut state), 1);

        assert_eq!(cancel_pending(&mut state), 1);
        assert_eq!(queued.state(), RequestState::Cancelled);
        assert_eq!(held.state(), RequestState::Admitted);
        assert_eq!(state.ledger().available(), Some(Cost::ZERO));
    }

    #[test]
    fn test_admission_after_shutdown_is_marked_skipped() {
        let mut state = finite(1.0);
        let before = request(0, Some(1.0));
        let after = request(1, Some(1.0));
        state.enqueue(Arc::clone(&before));
        state.enqueue(Arc::clone(&after));
        assert_eq!(admit_ready(&mut state), 1);

        assert!(state.begin_shutdown());
        assert!(!state.begin_shutdown());
        // Admitted earlier, still runs.
        assert_eq!(before.state(), RequestState::Admitted);

        state.ledger.release(before.cost());
        assert_eq!(admit_ready(&mut state), 1);
        assert_eq!(after.state(), RequestState::SkippedOnShutdown);
        assert_eq!(state.ledger().available(), Some(Cost::ZERO));
    }
}
