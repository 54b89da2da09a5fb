//! Calendar arithmetic in the configured timezone.
//!
//! The monthly quota cycle is a pure function of wall-clock time, never a
//! stored checkpoint.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// First instant of `date` in `tz`.
///
/// When midnight falls inside a DST gap the first valid local instant
/// after it is used.
#[must_use]
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default());
    first_valid_instant(naive, tz)
}

fn first_valid_instant(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    for shift in 0..=2 {
        if let Some(dt) = tz
            .from_local_datetime(&(naive + Duration::hours(shift)))
            .earliest()
        {
            return dt.with_timezone(&Utc);
        }
    }
    Utc.from_utc_datetime(&naive)
}

/// Calendar date of `instant` in `tz`
#[must_use]
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Hour of day (0-23) of `instant` in `tz`
#[must_use]
pub fn local_hour(instant: DateTime<Utc>, tz: Tz) -> u32 {
    instant.with_timezone(&tz).hour()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// Start of the monthly cycle containing `now`
#[must_use]
pub fn cycle_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    local_midnight(first_of_month(local_date(now, tz)), tz)
}

/// First instant of the next calendar month in `tz`
#[must_use]
pub fn next_monthly_reset(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let first = first_of_month(local_date(now, tz));
    // day 32 of any month is always inside the following month
    let next = first_of_month(first + Duration::days(32));
    local_midnight(next, tz)
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range; reversed bounds are swapped.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A single day
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// The last `days` days ending with (and including) the local date of `now`
    #[must_use]
    pub fn last_days(days: u32, now: DateTime<Utc>, tz: Tz) -> Self {
        let end = local_date(now, tz);
        let span = i64::from(days.max(1)) - 1;
        Self::new(end - Duration::days(span), end)
    }

    /// Number of calendar days covered
    #[must_use]
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Whether `date` is inside the range
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Half-open UTC bounds `[start, end)` of the range in `tz`
    #[must_use]
    pub fn bounds(&self, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            local_midnight(self.start, tz),
            local_midnight(self.end + Duration::days(1), tz),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn test_next_reset_mid_month() {
        let reset = next_monthly_reset(utc(2025, 3, 14, 10, 0), Tz::UTC);
        assert_eq!(reset, utc(2025, 4, 1, 0, 0));
    }

    #[test]
    fn test_next_reset_december_rolls_year() {
        let reset = next_monthly_reset(utc(2025, 12, 31, 23, 59), Tz::UTC);
        assert_eq!(reset, utc(2026, 1, 1, 0, 0));
    }

    #[test]
    fn test_next_reset_respects_timezone() {
        // 2025-03-31 20:00 UTC is already April 1st in Tokyo (UTC+9)
        let now = utc(2025, 3, 31, 20, 0);
        let reset = next_monthly_reset(now, Tz::Asia__Tokyo);
        // May 1st 00:00 JST == April 30th 15:00 UTC
        assert_eq!(reset, utc(2025, 4, 30, 15, 0));
        assert_eq!(cycle_start(now, Tz::Asia__Tokyo), utc(2025, 3, 31, 15, 0));
    }

    #[test]
    fn test_cycle_start_february() {
        let start = cycle_start(utc(2024, 2, 29, 12, 0), Tz::UTC);
        assert_eq!(start, utc(2024, 2, 1, 0, 0));
        assert_eq!(next_monthly_reset(start, Tz::UTC), utc(2024, 3, 1, 0, 0));
    }

    #[test]
    fn test_date_range_bounds_and_days() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(range.num_days(), 3);

        let (start, end) = range.bounds(Tz::UTC);
        assert_eq!(start, utc(2025, 1, 1, 0, 0));
        assert_eq!(end, utc(2025, 1, 4, 0, 0));
    }

    #[test]
    fn test_last_days() {
        let range = DateRange::last_days(7, utc(2025, 6, 10, 8, 0), Tz::UTC);
        assert_eq!(range.num_days(), 7);
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert!(range.contains(NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()));
    }
}
