//! Period calendar.
//!
//! Pure date arithmetic mapping a day and a [`PeriodFrequency`] to the
//! boundaries of the period that contains it. Weekly periods run Monday to
//! Sunday. Monthly and yearly periods follow the calendar. Fortnightly periods
//! are pairs of weeks anchored to a reference start (the budget's effective
//! start), so their boundaries follow the budget's own history rather than a
//! fixed epoch.

use crate::entities::PeriodFrequency;
use crate::errors::{Error, Result};
use chrono::{Datelike, Days, Months, NaiveDate};

/// Monday of the week containing `date`.
#[must_use]
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// First day of the period containing `date`.
///
/// `reference_start` only matters for fortnightly periods: fortnights start on
/// the Monday of the reference week and every 14 days before or after it.
#[must_use]
pub fn period_start(
    date: NaiveDate,
    frequency: PeriodFrequency,
    reference_start: NaiveDate,
) -> NaiveDate {
    match frequency {
        PeriodFrequency::Weekly => monday_of(date),
        PeriodFrequency::Fortnightly => {
            let monday = monday_of(date);
            let reference_monday = monday_of(reference_start);
            let weeks_diff = (monday - reference_monday).num_days().div_euclid(7);
            if weeks_diff.rem_euclid(2) == 1 {
                monday - Days::new(7)
            } else {
                monday
            }
        }
        PeriodFrequency::Monthly => date.with_day(1).unwrap_or(date),
        PeriodFrequency::Yearly => date.with_ordinal(1).unwrap_or(date),
    }
}

/// Last day of the period that starts on `start`.
#[must_use]
pub fn period_end(start: NaiveDate, frequency: PeriodFrequency) -> NaiveDate {
    match frequency {
        PeriodFrequency::Weekly => start + Days::new(6),
        PeriodFrequency::Fortnightly => start + Days::new(13),
        PeriodFrequency::Monthly => last_day_of_month(start.year(), start.month()).unwrap_or(start),
        PeriodFrequency::Yearly => NaiveDate::from_ymd_opt(start.year(), 12, 31).unwrap_or(start),
    }
}

/// Start of the period immediately before the one starting on `start`.
#[must_use]
pub fn previous_period_start(
    start: NaiveDate,
    frequency: PeriodFrequency,
    reference_start: NaiveDate,
) -> Option<NaiveDate> {
    let previous_end = start.pred_opt()?;
    Some(period_start(previous_end, frequency, reference_start))
}

/// Start of the period immediately after the one starting on `start`.
#[must_use]
pub fn next_period_start(start: NaiveDate, frequency: PeriodFrequency) -> Option<NaiveDate> {
    period_end(start, frequency).succ_opt()
}

/// Last calendar day of the given month.
#[must_use]
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Moves `date` forward by `months` calendar months.
///
/// The day of month is kept when the target month has it, otherwise the last
/// day of the target month is used (Jan 31 + 1 month is Feb 28 or Feb 29).
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::DateOutOfRange {
            message: format!("{date} + {months} months"),
        })
}

/// Moves `date` forward by `days` days.
pub fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| Error::DateOutOfRange {
            message: format!("{date} + {days} days"),
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const ALL: [PeriodFrequency; 4] = [
        PeriodFrequency::Weekly,
        PeriodFrequency::Fortnightly,
        PeriodFrequency::Monthly,
        PeriodFrequency::Yearly,
    ];

    #[test]
    fn test_weekly_starts_on_monday() {
        // 2024-05-15 is a Wednesday
        let start = period_start(d(2024, 5, 15), PeriodFrequency::Weekly, d(2024, 1, 1));
        assert_eq!(start, d(2024, 5, 13));
        assert_eq!(start.weekday(), Weekday::Mon);
        assert_eq!(period_end(start, PeriodFrequency::Weekly), d(2024, 5, 19));
    }

    #[test]
    fn test_monthly_bounds_including_december() {
        let start = period_start(d(2023, 12, 17), PeriodFrequency::Monthly, d(2023, 1, 1));
        assert_eq!(start, d(2023, 12, 1));
        assert_eq!(period_end(start, PeriodFrequency::Monthly), d(2023, 12, 31));

        let feb = period_start(d(2024, 2, 10), PeriodFrequency::Monthly, d(2024, 1, 1));
        assert_eq!(period_end(feb, PeriodFrequency::Monthly), d(2024, 2, 29));
    }

    #[test]
    fn test_yearly_bounds() {
        let start = period_start(d(2024, 7, 4), PeriodFrequency::Yearly, d(2020, 1, 1));
        assert_eq!(start, d(2024, 1, 1));
        assert_eq!(period_end(start, PeriodFrequency::Yearly), d(2024, 12, 31));
    }

    #[test]
    fn test_every_date_lies_within_its_period() {
        let reference = d(2024, 1, 10);
        let mut date = d(2023, 11, 1);
        while date <= d(2024, 4, 30) {
            for frequency in ALL {
                let start = period_start(date, frequency, reference);
                let end = period_end(start, frequency);
                assert!(start <= date && date <= end, "{frequency} {date}: {start}..{end}");
            }
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_fortnightly_alternates_from_reference() {
        // Reference Wednesday 2024-01-10, whose Monday is 2024-01-08
        let reference = d(2024, 1, 10);
        let f = PeriodFrequency::Fortnightly;

        assert_eq!(period_start(d(2024, 1, 8), f, reference), d(2024, 1, 8));
        assert_eq!(period_start(d(2024, 1, 21), f, reference), d(2024, 1, 8));
        assert_eq!(period_start(d(2024, 1, 22), f, reference), d(2024, 1, 22));
        assert_eq!(period_end(d(2024, 1, 22), f), d(2024, 2, 4));
        // Dates before the reference still land on the same 14-day grid
        assert_eq!(period_start(d(2024, 1, 1), f, reference), d(2023, 12, 25));
        assert_eq!(period_start(d(2023, 12, 24), f, reference), d(2023, 12, 11));
    }

    #[test]
    fn test_fortnightly_step_properties() {
        let reference = d(2024, 3, 6);
        let f = PeriodFrequency::Fortnightly;
        let mut date = d(2023, 10, 1);
        while date <= d(2024, 8, 1) {
            let start = period_start(date, f, reference);
            let plus_14 = period_start(date + Days::new(14), f, reference);
            assert_eq!((plus_14 - start).num_days(), 14);

            let plus_7 = period_start(date + Days::new(7), f, reference);
            let diff = (plus_7 - start).num_days();
            assert!(diff == 0 || diff == 14, "unexpected shift {diff} at {date}");
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_previous_and_next_period_start() {
        let f = PeriodFrequency::Monthly;
        let reference = d(2024, 1, 1);
        assert_eq!(previous_period_start(d(2024, 3, 1), f, reference), Some(d(2024, 2, 1)));
        assert_eq!(next_period_start(d(2024, 12, 1), f), Some(d(2025, 1, 1)));
        assert_eq!(
            next_period_start(d(2024, 1, 8), PeriodFrequency::Fortnightly),
            Some(d(2024, 1, 22))
        );
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months_clamped(d(2023, 1, 31), 1).unwrap(), d(2023, 2, 28));
        assert_eq!(add_months_clamped(d(2024, 1, 31), 1).unwrap(), d(2024, 2, 29));
        assert_eq!(add_months_clamped(d(2024, 1, 31), 2).unwrap(), d(2024, 3, 31));
        assert_eq!(add_months_clamped(d(2024, 12, 15), 1).unwrap(), d(2025, 1, 15));
    }

    #[test]
    fn test_add_months_overflow_is_an_error() {
        let result = add_months_clamped(NaiveDate::MAX, 1);
        assert!(matches!(result, Err(Error::DateOutOfRange { .. })));
    }
}
