//! Tests for the public ledger and handle types

use prometheus_admission::core::{Cost, ResourceLedger, TaskOutcome};

#[test]
fn test_ledger_from_units() {
    let ledger = ResourceLedger::from_units(Some(2.5));
    assert_eq!(ledger.capacity(), Some(Cost::from_units(2.5)));
    assert_eq!(ledger.available(), ledger.capacity());
    assert!(!ledger.is_unlimited());
    assert!(ResourceLedger::from_units(None).is_unlimited());
}

#[test]
fn test_cost_display() {
    assert_eq!(Cost::from_units(0.25).to_string(), "0.25");
}

#[test]
fn test_outcome_into_result() {
    assert_eq!(TaskOutcome::Completed(3).into_result().unwrap(), Some(3));
    assert_eq!(TaskOutcome::<u8>::SkippedOnShutdown.into_result().unwrap(), None);
    assert!(TaskOutcome::<u8>::Cancelled.into_result().is_err());
    assert!(TaskOutcome::<u8>::Panicked("x".into()).into_result().is_err());
}
