//! Time sources.
//!
//! Nothing in the engine reads the system clock directly. Callers hand in a
//! [`Clock`] and the user's timezone, and "today" is derived from both. This keeps
//! period boundaries deterministic in tests and independent of the host's zone.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Abstracts access to the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the calendar day of `now()` in `tz`.
    fn today(&self, tz: Tz) -> NaiveDate {
        local_date(self.now(), tz)
    }
}

/// Real-time clock backed by the system UTC time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock frozen at noon UTC on the given day.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::hours(12))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Converts a UTC instant to the calendar day it falls on in `tz`.
#[must_use]
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Drops the time-of-day of an instant, keeping the local calendar day.
///
/// Transactions store only this day, so a purchase at 23:59 and one at 00:01
/// on the same local day land in the same period.
#[must_use]
pub fn normalize_to_day<T: TimeZone>(instant: &DateTime<T>, tz: Tz) -> NaiveDate {
    local_date(instant.with_timezone(&Utc), tz)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_today_depends_on_timezone() {
        // 2024-03-10 20:00 UTC is already 2024-03-11 in Auckland
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let clock = FixedClock(instant);
        assert_eq!(
            clock.today(chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
        );
        assert_eq!(
            clock.today(chrono_tz::Pacific::Auckland),
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
        );
    }

    #[test]
    fn test_normalize_to_day_discards_time() {
        let late = Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 31, 0, 0, 1).unwrap();
        assert_eq!(
            normalize_to_day(&late, chrono_tz::UTC),
            normalize_to_day(&early, chrono_tz::UTC)
        );
    }

    #[test]
    fn test_fixed_clock_on_is_midday() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(FixedClock::on(date).today(chrono_tz::UTC), date);
    }
}
