//! Task binding: the worker-side half of the admission handshake.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::executor::Shared;
use crate::core::handle::{Completer, TaskOutcome};
use crate::core::request::{AdmissionRequest, RequestState};
use crate::core::stats::ExecutorCounters;

/// A submitted callable bound to its admission request and result slot.
pub(crate) struct TaskBinding<F, R> {
    shared: Arc<Shared>,
    request: Arc<AdmissionRequest>,
    task: F,
    completer: Completer<R>,
}

impl<F, R> TaskBinding<F, R>
where
    F: FnOnce() -> R,
{
    pub(crate) fn new(
        shared: Arc<Shared>,
        request: Arc<AdmissionRequest>,
        task: F,
        completer: Completer<R>,
    ) -> Self {
        Self {
            shared,
            request,
            task,
            completer,
        }
    }

    /// Wait for admission, run the callable, then return the budget.
    ///
    /// Runs on a worker thread. Whether the callable is skipped was decided
    /// when the request was admitted. The budget is credited and the
    /// scheduler re-run before the handle resolves, whether the callable
    /// returned, panicked or was skipped.
    pub(crate) fn run(self) {
        let Self {
            shared,
            request,
            task,
            completer,
        } = self;
        let task_id = request.id();

        let outcome = match request.wait_for_admission() {
            RequestState::Admitted => {
                request.transition(RequestState::Running);
                ExecutorCounters::incr(&shared.counters.running);
                let result = panic::catch_unwind(AssertUnwindSafe(task));
                ExecutorCounters::decr(&shared.counters.running);

                match result {
                    Ok(value) => {
                        request.transition(RequestState::Completed);
                        ExecutorCounters::incr(&shared.counters.completed);
                        TaskOutcome::Completed(value)
                    }
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        warn!(task_id, error = %msg, "task panicked");
                        request.transition(RequestState::Failed);
                        ExecutorCounters::incr(&shared.counters.failed);
                        TaskOutcome::Panicked(msg)
                    }
                }
            }
            RequestState::SkippedOnShutdown => {
                ExecutorCounters::incr(&shared.counters.skipped);
                debug!(task_id, "task admitted after shutdown, skipping");
                TaskOutcome::SkippedOnShutdown
            }
            RequestState::Cancelled => {
                // Never debited, nothing to give back.
                debug!(task_id, "task cancelled before admission");
                completer.complete(TaskOutcome::Cancelled);
                return;
            }
            other => unreachable!("request {task_id} released in state {other:?}"),
        };

        shared.release(&request);
        completer.complete(outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let p = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "static");

        let p = panic::catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "formatted 1");

        let p = panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "non-string panic payload");
    }
}
