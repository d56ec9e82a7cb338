//! Injectable time source and civil-day helpers.

use std::sync::Mutex;

use chrono::Datelike;
use chrono_tz::Tz;
use time::{Duration, OffsetDateTime};

use crate::cache::lock::mutex_lock;

/// Supplies "now". Pure and injectable; production uses [`SystemClock`],
/// tests pin time with [`FixedClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Test clock pinned to an instant; can be advanced between calls.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn at(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *mutex_lock(&self.now, "fixed_clock.set") = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = mutex_lock(&self.now, "fixed_clock.advance");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *mutex_lock(&self.now, "fixed_clock.now")
    }
}

/// Start of the rolling qualifying-entry window.
pub fn window_start(now: OffsetDateTime, hours: i64) -> OffsetDateTime {
    now - Duration::hours(hours)
}

/// The civil date of `at` in the given timezone as `(year, month, day)`.
///
/// Returns `None` only for instants outside chrono's representable range;
/// callers treat that as "not fresh" rather than erroring.
pub fn civil_date(at: OffsetDateTime, tz: Tz) -> Option<(i32, u8, u8)> {
    let utc = chrono::DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())?;
    let local = utc.with_timezone(&tz).date_naive();
    Some((local.year(), local.month() as u8, local.day() as u8))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::at(datetime!(2024-06-15 10:00 UTC));
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), datetime!(2024-06-15 12:00 UTC));
    }

    #[test]
    fn window_start_subtracts_hours() {
        let now = datetime!(2024-06-15 10:00 UTC);
        assert_eq!(window_start(now, 24), datetime!(2024-06-14 10:00 UTC));
    }

    #[test]
    fn civil_date_in_utc() {
        let at = datetime!(2024-06-15 23:30 UTC);
        assert_eq!(civil_date(at, Tz::UTC), Some((2024, 6, 15)));
    }

    #[test]
    fn civil_date_respects_the_zone() {
        // 23:30 UTC is already the next day in Istanbul (UTC+3).
        let at = datetime!(2024-06-15 23:30 UTC);
        assert_eq!(civil_date(at, Tz::Europe__Istanbul), Some((2024, 6, 16)));
    }
}
