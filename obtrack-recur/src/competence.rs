//! Competence: the reference period (month/year) an obligation covers
//!
//! Canonical text form is `MM/YYYY`. Parsing also accepts the forms found in
//! historical records:
//! - `MM/YYYY` (month may be one digit)
//! - `YYYY-MM` or `YYYY-MM-DD`
//! - any string of length >= 7 whose first four characters are the year and
//!   characters 5..7 the month (`2024.03`, `2024 03 extra`)

use crate::error::{RecurrenceError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Month/year pair; field order makes the derived `Ord` chronological
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Competence {
    year: i32,
    month: u32,
}

impl Competence {
    pub const MIN_YEAR: i32 = 1;
    pub const MAX_YEAR: i32 = 9999;

    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(RecurrenceError::InvalidCompetenceFormat(format!(
                "{:02}/{}",
                month, year
            )));
        }
        Ok(Self { year, month })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Competence of the month a date falls in
    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse any accepted textual form
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || RecurrenceError::InvalidCompetenceFormat(text.to_string());
        let trimmed = text.trim();

        let (month, year) = if let Some((month, year)) = trimmed.split_once('/') {
            if month.is_empty() || month.len() > 2 || year.len() != 4 {
                return Err(invalid());
            }
            (parse_digits(month).ok_or_else(invalid)?, parse_digits(year).ok_or_else(invalid)?)
        } else if trimmed.contains('-') {
            let mut parts = trimmed.split('-');
            let year = parts.next().filter(|y| y.len() == 4).ok_or_else(invalid)?;
            let month = parts.next().filter(|m| m.len() == 2).ok_or_else(invalid)?;
            (parse_digits(month).ok_or_else(invalid)?, parse_digits(year).ok_or_else(invalid)?)
        } else if trimmed.len() >= 7 {
            let year = trimmed.get(0..4).ok_or_else(invalid)?;
            let month = trimmed.get(5..7).ok_or_else(invalid)?;
            (parse_digits(month).ok_or_else(invalid)?, parse_digits(year).ok_or_else(invalid)?)
        } else {
            return Err(invalid());
        };

        let year = i32::try_from(year).map_err(|_| invalid())?;
        Self::new(month, year).map_err(|_| invalid())
    }

    /// Competence `months` calendar months later
    pub fn plus_months(self, months: u32) -> Result<Self> {
        let index = i64::from(self.year) * 12 + i64::from(self.month - 1) + i64::from(months);
        let year = index.div_euclid(12);
        let month = (index.rem_euclid(12) + 1) as u32;
        let year = i32::try_from(year).unwrap_or(i32::MAX);
        Self::new(month, year)
    }

    /// The following month, rolling 12 into January of the next year
    pub fn succ(self) -> Result<Self> {
        self.plus_months(1)
    }

    /// `year * 100 + month`, a numeric key that sorts chronologically
    pub fn period_key(&self) -> i64 {
        i64::from(self.year) * 100 + i64::from(self.month)
    }

    /// First day of the competence month
    pub fn first_day(&self) -> NaiveDate {
        // month and year were validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }
}

fn parse_digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for Competence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl FromStr for Competence {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Competence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Competence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Re-render any accepted form as `MM/YYYY`; unparsable text is returned as-is
pub fn canonicalize(text: &str) -> String {
    Competence::parse(text)
        .map(|c| c.to_string())
        .unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(month: u32, year: i32) -> Competence {
        Competence::new(month, year).unwrap()
    }

    #[test]
    fn test_parse_slash_form() {
        assert_eq!(Competence::parse("01/2024").unwrap(), comp(1, 2024));
        assert_eq!(Competence::parse("3/2025").unwrap(), comp(3, 2025));
        assert_eq!(Competence::parse(" 12/1999 ").unwrap(), comp(12, 1999));
    }

    #[test]
    fn test_parse_iso_forms() {
        assert_eq!(Competence::parse("2024-02").unwrap(), comp(2, 2024));
        assert_eq!(Competence::parse("2024-02-17").unwrap(), comp(2, 2024));
    }

    #[test]
    fn test_parse_prefixed_form() {
        assert_eq!(Competence::parse("2024.11").unwrap(), comp(11, 2024));
        assert_eq!(Competence::parse("2023 07 ref").unwrap(), comp(7, 2023));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "13/2024", "00/2024", "1/24", "ab/2024", "2024-1", "2024", "jan 2024", "01/10000", "2024/01"] {
            let err = Competence::parse(bad).unwrap_err();
            match err {
                RecurrenceError::InvalidCompetenceFormat(text) => assert_eq!(text, bad),
                other => panic!("unexpected error for {:?}: {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_display_zero_pads() {
        assert_eq!(comp(2, 2024).to_string(), "02/2024");
        assert_eq!(comp(11, 987).to_string(), "11/0987");
    }

    #[test]
    fn test_succ_rolls_year() {
        assert_eq!(comp(1, 2024).succ().unwrap(), comp(2, 2024));
        assert_eq!(comp(12, 2024).succ().unwrap(), comp(1, 2025));
    }

    #[test]
    fn test_succ_past_max_year_fails() {
        let err = comp(12, 9999).succ().unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidCompetenceFormat(ref t) if t == "01/10000"));
    }

    #[test]
    fn test_plus_months() {
        assert_eq!(comp(11, 2024).plus_months(3).unwrap(), comp(2, 2025));
        assert_eq!(comp(1, 2024).plus_months(24).unwrap(), comp(1, 2026));
    }

    #[test]
    fn test_ordering_is_chronological() {
        assert!(comp(12, 2023) < comp(1, 2024));
        assert!(comp(2, 2024) > comp(1, 2024));
        assert!(comp(12, 2023).period_key() < comp(1, 2024).period_key());
    }

    #[test]
    fn test_of_date() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 31).unwrap();
        assert_eq!(Competence::of_date(date), comp(7, 2024));
        assert_eq!(comp(7, 2024).first_day(), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("2024-03"), "03/2024");
        assert_eq!(canonicalize("3/2024"), "03/2024");
        assert_eq!(canonicalize("garbage"), "garbage");
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&comp(4, 2024)).unwrap();
        assert_eq!(json, "\"04/2024\"");
        let back: Competence = serde_json::from_str("\"2024-04\"").unwrap();
        assert_eq!(back, comp(4, 2024));
    }
}
