//! Resource ledger: the shared budget that gates admission.
//!
//! Costs are supplied as floating-point units (for example fractional CPU
//! cores) and stored as integer micro-units, so that any sequence of debits
//! followed by the matching credits restores the balance exactly.

use std::fmt;

/// Number of ledger micro-units in one resource unit.
pub const MICROS_PER_UNIT: f64 = 1_000_000.0;

const SNAP_TOLERANCE: f64 = 4.0 * f64::EPSILON;

/// Resource cost of a single task, in ledger micro-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cost(u64);

impl Cost {
    /// A cost of nothing. Still debits (zero) from a finite ledger.
    pub const ZERO: Self = Self(0);

    /// Convert a unit amount into a cost, rejecting negative, NaN and
    /// infinite values.
    ///
    /// Rounds up to the next micro-unit, so a cost never debits less than
    /// was asked for.
    #[must_use]
    pub fn try_from_units(units: f64) -> Option<Self> {
        scale_to_micros(units, f64::ceil).map(Self)
    }

    /// Convert a budget in units into micro-units, rounding down so the
    /// ledger never holds more than was configured.
    #[must_use]
    pub fn try_from_budget_units(units: f64) -> Option<Self> {
        scale_to_micros(units, f64::floor).map(Self)
    }

    /// Convert a unit amount into a cost, rounding up.
    ///
    /// # Panics
    ///
    /// Panics if `units` is negative, NaN, infinite or too large for the
    /// ledger. Supplying such a cost is a usage error.
    #[must_use]
    pub fn from_units(units: f64) -> Self {
        Self::try_from_units(units)
            .unwrap_or_else(|| panic!("resource cost must be a finite, nonnegative number, got {units}"))
    }

    /// Build a cost directly from micro-units.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Cost in micro-units.
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Cost in resource units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn units(self) -> f64 {
        self.0 as f64 / MICROS_PER_UNIT
    }
}

/// Scale `units` to micro-units. Products within float noise of a whole
/// micro-unit snap to it; anything else goes through `direction`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale_to_micros(units: f64, direction: fn(f64) -> f64) -> Option<u64> {
    if !units.is_finite() || units < 0.0 {
        return None;
    }
    let scaled = units * MICROS_PER_UNIT;
    let nearest = scaled.round();
    let micros = if (scaled - nearest).abs() <= scaled.max(1.0) * SNAP_TOLERANCE {
        nearest
    } else {
        direction(scaled)
    };
    // u64::MAX rounds up to 2^64 as f64, which no longer fits.
    if micros >= u64::MAX as f64 {
        return None;
    }
    Some(micros as u64)
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.units())
    }
}

/// Remaining admission budget.
///
/// Only the scheduler mutates a ledger, and only through the guard of the
/// scheduler lock; `try_reserve` and `release` are therefore crate-private.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLedger {
    /// Every request is admitted and nothing is ever debited.
    Unlimited,
    /// A finite budget.
    Finite {
        /// Budget when nothing is running.
        capacity: Cost,
        /// Budget currently free.
        available: Cost,
    },
}

impl ResourceLedger {
    /// Ledger that admits everything.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::Unlimited
    }

    /// Ledger with `capacity` free units.
    #[must_use]
    pub const fn finite(capacity: Cost) -> Self {
        Self::Finite {
            capacity,
            available: capacity,
        }
    }

    /// Ledger from an optional unit amount; `None` means unlimited. The
    /// budget is rounded down to whole micro-units.
    ///
    /// # Panics
    ///
    /// Panics if `available` is negative, NaN, infinite or too large.
    #[must_use]
    pub fn from_units(available: Option<f64>) -> Self {
        available.map_or(Self::Unlimited, |units| {
            let capacity = Cost::try_from_budget_units(units).unwrap_or_else(|| {
                panic!("resource budget must be a finite, nonnegative number, got {units}")
            });
            Self::finite(capacity)
        })
    }

    /// Whether this ledger is the unlimited sentinel.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Currently free budget, `None` when unlimited.
    #[must_use]
    pub const fn available(&self) -> Option<Cost> {
        match self {
            Self::Unlimited => None,
            Self::Finite { available, .. } => Some(*available),
        }
    }

    /// Total budget, `None` when unlimited.
    #[must_use]
    pub const fn capacity(&self) -> Option<Cost> {
        match self {
            Self::Unlimited => None,
            Self::Finite { capacity, .. } => Some(*capacity),
        }
    }

    /// Debit `cost` if it fits. Unconstrained requests (`None`) always fit
    /// and never debit.
    pub(crate) fn try_reserve(&mut self, cost: Option<Cost>) -> bool {
        let Some(cost) = cost else {
            return true;
        };
        match self {
            Self::Unlimited => true,
            Self::Finite { available, .. } => {
                if cost > *available {
                    return false;
                }
                *available = available
                    .0
                    .checked_sub(cost.0)
                    .map(Cost)
                    .expect("ledger underflow after a passing fit check");
                true
            }
        }
    }

    /// Credit `cost` back. A no-op for unconstrained requests.
    ///
    /// # Panics
    ///
    /// Panics if the credit would push the balance above capacity, which can
    /// only happen on a double release.
    pub(crate) fn release(&mut self, cost: Option<Cost>) {
        let Some(cost) = cost else {
            return;
        };
        if let Self::Finite {
            capacity,
            available,
        } = self
        {
            let restored = available.0.saturating_add(cost.0);
            assert!(
                restored <= capacity.0,
                "ledger over-credited: {} + {} exceeds capacity {}",
                available,
                cost,
                capacity
            );
            *available = Cost(restored);
        }
    }
}
