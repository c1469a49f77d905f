//! # Prometheus Admission
//!
//! Resource-budgeted admission control on top of a thread pool.
//!
//! Callers submit closures that may declare a resource cost, for example a
//! fraction of a CPU core or a share of GPU memory. The executor keeps a
//! ledger of the budget still free and lets a task run only while the ledger
//! covers its cost; everything else waits in a pending queue until running
//! tasks hand their budget back.
//!
//! ## Core Problem Solved
//!
//! Thread count is a poor proxy for load when tasks differ in weight:
//!
//! - **Mixed task sizes**: one task may need four cores while another needs a quarter
//! - **Shared budget**: many callers draw from the same finite pool of resources
//! - **No busy waiting**: queued work must start as soon as budget frees up
//!
//! ## Key Features
//!
//! - **Budget-gated admission**: tasks run only while the ledger has headroom
//! - **Greedy scan**: a cheap task can start ahead of an expensive one that does not fit yet
//! - **Lost-wakeup-safe handshake**: every admission wait is guarded by a latch
//! - **Unbounded worker pool**: the ledger, not thread count, is the throttle
//! - **Future-like handles**: blocking, timed and async result retrieval
//!
//! ## Example
//!
//! ```rust,no_run
//! use prometheus_admission::core::ResourceExecutor;
//! use std::time::Duration;
//!
//! // Two units of budget: at most two of these sleep at once.
//! let executor = ResourceExecutor::new(2.0)?;
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         executor.submit_with_cost(1.0, move || {
//!             std::thread::sleep(Duration::from_millis(100));
//!             i
//!         })
//!     })
//!     .collect::<Result<_, _>>()?;
//!
//! for handle in handles {
//!     assert!(handle.join()?.is_some());
//! }
//! executor.shutdown(true);
//! # Ok::<(), prometheus_admission::core::SchedulerError>(())
//! ```
//!
//! Unconstrained work goes through [`core::ResourceExecutor::submit`] and is
//! admitted immediately. Supplying a cost to an executor without a budget is
//! a usage error and panics.
//!
//! For complete examples, see:
//! - `tests/admission_test.rs` - scheduling behavior
//! - `tests/executor_test.rs` - timing, shutdown and error propagation

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and budget accounting.
pub mod core;
/// Configuration models for executors and worker pools.
pub mod config;
/// Builders to construct executors from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
