//! Timestamp utilities

use chrono::{DateTime, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current calendar date (UTC)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Format a date the way generated obligation notes display it (DD/MM/YYYY)
pub fn format_br_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_today_matches_now() {
        let date = today();
        let stamp = now().date_naive();
        // Allow a midnight rollover between the two calls
        assert!(stamp.signed_duration_since(date).num_days() <= 1);
    }

    #[test]
    fn test_format_br_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(format_br_date(date), "09/02/2024");
    }
}
