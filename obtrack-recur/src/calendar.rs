//! Calendar arithmetic with day-of-month clamping
//!
//! A nominal day that does not exist in the target month becomes that
//! month's last day; dates never spill into the following month.

use crate::error::{RecurrenceError, Result};
use chrono::{Datelike, Duration, Months, NaiveDate};

/// Number of days in `month` of `year` (leap years included)
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// `day` limited to the last valid day of the month
pub fn clamp_day(year: i32, month: u32, day: u32) -> u32 {
    day.min(days_in_month(year, month)).max(1)
}

/// Date in the given month on `anchor_day`, clamped
pub fn anchored_date(year: i32, month: u32, anchor_day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, clamp_day(year, month, anchor_day)).ok_or_else(|| {
        RecurrenceError::DateOutOfRange(format!("{:04}-{:02}-{:02}", year, month, anchor_day))
    })
}

/// Add calendar months, keeping the day when it exists and clamping otherwise
///
/// `2024-01-31 + 1 month = 2024-02-29`
pub fn add_months_with_clamp(date: NaiveDate, months: i32) -> Result<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };

    shifted.ok_or_else(|| RecurrenceError::DateOutOfRange(format!("{} {:+} months", date, months)))
}

/// Shift a date by a signed number of days
pub fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| RecurrenceError::DateOutOfRange(format!("{} {:+} days", date, days)))
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn test_anchor_clamps_in_short_months() {
        // Every anchor 29..=31 in every short month lands on the month's last day
        let short_months = [(2023, 2), (2025, 2), (2024, 4), (2024, 6), (2024, 9), (2024, 11)];
        for (year, month) in short_months {
            let last = days_in_month(year, month);
            for anchor in 29..=31 {
                let date = anchored_date(year, month, anchor).unwrap();
                assert_eq!(date.month(), month, "{}-{} anchor {} overflowed", year, month, anchor);
                assert_eq!(date.day(), anchor.min(last));
            }
        }
    }

    #[test]
    fn test_anchor_kept_in_long_months() {
        assert_eq!(anchored_date(2024, 3, 31).unwrap(), ymd(2024, 3, 31));
        assert_eq!(anchored_date(2024, 2, 15).unwrap(), ymd(2024, 2, 15));
    }

    #[test]
    fn test_add_months_with_clamp() {
        assert_eq!(add_months_with_clamp(ymd(2024, 1, 31), 1).unwrap(), ymd(2024, 2, 29));
        assert_eq!(add_months_with_clamp(ymd(2023, 1, 31), 1).unwrap(), ymd(2023, 2, 28));
        assert_eq!(add_months_with_clamp(ymd(2024, 12, 15), 1).unwrap(), ymd(2025, 1, 15));
        assert_eq!(add_months_with_clamp(ymd(2024, 3, 31), -1).unwrap(), ymd(2024, 2, 29));
    }

    #[test]
    fn test_add_days_negative() {
        assert_eq!(add_days(ymd(2024, 3, 1), -1).unwrap(), ymd(2024, 2, 29));
    }

    #[test]
    fn test_add_months_overflow_is_error() {
        let err = add_months_with_clamp(NaiveDate::MAX, 1).unwrap_err();
        assert!(matches!(err, RecurrenceError::DateOutOfRange(_)));
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(ymd(2024, 5, 17)), ymd(2024, 5, 1));
    }
}
