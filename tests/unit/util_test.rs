//! Tests for utility functions

use prometheus_admission::util::{init_tracing, init_tracing_with_filter};

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing();
    init_tracing();
    init_tracing_with_filter("debug");
}
