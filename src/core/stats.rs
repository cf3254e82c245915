//! Spending statistics derived from amounts and frequencies.
//!
//! Everything here is exact decimal arithmetic; divisions by zero resolve to
//! zero instead of failing.

use crate::core::period::Entry;
use crate::entities::PeriodFrequency;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const WEEKS_PER_YEAR: Decimal = dec!(52);
const MONTHS_PER_YEAR: Decimal = dec!(12);
const DAYS_PER_WEEK: Decimal = dec!(7);

/// Weekly equivalent of an amount paid or budgeted at `frequency`.
///
/// Monthly converts through the year (`amount * 12 / 52`), not a 4-week month.
#[must_use]
pub fn weekly_equivalent(amount: Decimal, frequency: PeriodFrequency) -> Decimal {
    match frequency {
        PeriodFrequency::Weekly => amount,
        PeriodFrequency::Fortnightly => amount / dec!(2),
        PeriodFrequency::Monthly => amount * MONTHS_PER_YEAR / WEEKS_PER_YEAR,
        PeriodFrequency::Yearly => amount / WEEKS_PER_YEAR,
    }
}

/// Monthly equivalent of a weekly amount.
#[must_use]
pub fn monthly_from_weekly(weekly: Decimal) -> Decimal {
    weekly * WEEKS_PER_YEAR / MONTHS_PER_YEAR
}

/// Yearly equivalent of a weekly amount.
#[must_use]
pub fn yearly_from_weekly(weekly: Decimal) -> Decimal {
    weekly * WEEKS_PER_YEAR
}

/// `part / whole * 100`, or zero when `whole` is zero.
#[must_use]
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole)
        .map_or(Decimal::ZERO, |ratio| ratio * dec!(100))
}

/// Average weekly spend from the first entry up to `today`.
///
/// Entries must be sorted by date. Fewer than seven days of history count as
/// one full week, and an empty history averages to zero.
#[must_use]
pub fn avg_weekly_spent(entries: &[Entry], today: NaiveDate) -> Decimal {
    let Some(first) = entries.first() else {
        return Decimal::ZERO;
    };
    let total: Decimal = entries.iter().map(|e| e.amount).sum();
    let days = Decimal::from((today - first.date).num_days());
    let weeks = (days / DAYS_PER_WEEK).max(Decimal::ONE);
    total / weeks
}

/// Sum of entry amounts.
#[must_use]
pub fn total(entries: &[Entry]) -> Decimal {
    entries.iter().map(|e| e.amount).sum()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekly_equivalent() {
        assert_eq!(weekly_equivalent(dec!(100), PeriodFrequency::Weekly), dec!(100));
        assert_eq!(weekly_equivalent(dec!(100), PeriodFrequency::Fortnightly), dec!(50));
        assert_eq!(weekly_equivalent(dec!(520), PeriodFrequency::Monthly), dec!(120));
        assert_eq!(weekly_equivalent(dec!(5200), PeriodFrequency::Yearly), dec!(100));
    }

    #[test]
    fn test_weekly_round_trips_through_month() {
        assert_eq!(monthly_from_weekly(dec!(120)), dec!(520));
        assert_eq!(yearly_from_weekly(dec!(100)), dec!(5200));
    }

    #[test]
    fn test_percentage_of_zero_budget_is_zero() {
        assert_eq!(percentage_of(dec!(50), dec!(0)), dec!(0));
        assert_eq!(percentage_of(dec!(50), dec!(200)), dec!(25));
        assert_eq!(percentage_of(dec!(-20), dec!(100)), dec!(-20));
    }

    #[test]
    fn test_avg_weekly_spent() {
        let entries = vec![
            Entry {
                date: d(2024, 1, 1),
                amount: dec!(70),
            },
            Entry {
                date: d(2024, 1, 10),
                amount: dec!(70),
            },
        ];
        // 14 days -> 2 weeks
        assert_eq!(avg_weekly_spent(&entries, d(2024, 1, 15)), dec!(70));
        // Under a week counts as one week
        assert_eq!(avg_weekly_spent(&entries, d(2024, 1, 3)), dec!(140));
        assert_eq!(avg_weekly_spent(&[], d(2024, 1, 3)), dec!(0));
    }
}
