//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "prometheus_admission=info";

/// Install a default `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to [`DEFAULT_FILTER`]. Does nothing if a subscriber is already set, so
/// applications remain free to install their own.
pub fn init_tracing() {
    init_tracing_with_filter(DEFAULT_FILTER);
}

/// Like [`init_tracing`] with a caller-chosen fallback filter.
pub fn init_tracing_with_filter(default_filter: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
