//! Rollover resolver.
//!
//! Unspent money from one period is carried into the next, optionally capped.
//! The carry is computed from the previous period's *effective* budget (its own
//! carry-in included), so unused funds can compound across several periods, but
//! each period is clamped to the cap independently.

use rust_decimal::Decimal;

/// What the previous period left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorPeriod {
    /// Rollover-inclusive budget of the previous period
    pub budget_amount: Decimal,
    /// Spend recorded in the previous period
    pub total_spent: Decimal,
}

/// Carry-in and effective budget for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverOutcome {
    /// Amount carried in from the previous period, never negative
    pub rollover_amount: Decimal,
    /// `base_amount + rollover_amount`
    pub budget_amount: Decimal,
}

/// Computes the carry-in for a period.
///
/// `prior` is `None` for the first period of a budget, which never receives a
/// carry. An overspent previous period carries nothing; debt is not rolled.
#[must_use]
pub fn resolve_rollover(
    base_amount: Decimal,
    rollover_max: Option<Decimal>,
    prior: Option<PriorPeriod>,
) -> RolloverOutcome {
    let rollover_amount = prior.map_or(Decimal::ZERO, |prior| {
        let remaining = (prior.budget_amount - prior.total_spent).max(Decimal::ZERO);
        rollover_max.map_or(remaining, |cap| remaining.min(cap.max(Decimal::ZERO)))
    });

    RolloverOutcome {
        rollover_amount,
        budget_amount: base_amount + rollover_amount,
    }
}
