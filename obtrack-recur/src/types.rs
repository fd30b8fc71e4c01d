//! Core value types shared by the engine, the store and the service

use crate::calendar;
use crate::error::{RecurrenceError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often an obligation recurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Monthly,
        Frequency::Bimonthly,
        Frequency::Quarterly,
        Frequency::Semiannual,
        Frequency::Annual,
    ];

    /// Months between consecutive due dates in window mode
    pub fn month_step(self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Bimonthly => 2,
            Frequency::Quarterly => 3,
            Frequency::Semiannual => 6,
            Frequency::Annual => 12,
        }
    }

    /// Days from due date to delivery deadline when no reference occurrence exists
    pub fn fallback_deadline_days(self) -> i64 {
        match self {
            Frequency::Monthly => 15,
            Frequency::Bimonthly => 20,
            Frequency::Quarterly => 30,
            Frequency::Semiannual => 45,
            Frequency::Annual => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Bimonthly => "bimonthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Semiannual => "semiannual",
            Frequency::Annual => "annual",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts English names and the catalog's Portuguese codes
impl FromStr for Frequency {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "mensal" => Ok(Frequency::Monthly),
            "bimonthly" | "bimestral" => Ok(Frequency::Bimonthly),
            "quarterly" | "trimestral" => Ok(Frequency::Quarterly),
            "semiannual" | "semestral" => Ok(Frequency::Semiannual),
            "annual" | "yearly" | "anual" => Ok(Frequency::Annual),
            _ => Err(RecurrenceError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Nominal due day of month, 1..=31
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AnchorDay(u32);

impl AnchorDay {
    pub fn new(day: i64) -> Result<Self> {
        if (1..=31).contains(&day) {
            Ok(Self(day as u32))
        } else {
            Err(RecurrenceError::InvalidAnchorDay(day))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for AnchorDay {
    type Error = RecurrenceError;

    fn try_from(day: i64) -> Result<Self> {
        Self::new(day)
    }
}

impl From<AnchorDay> for i64 {
    fn from(day: AnchorDay) -> Self {
        i64::from(day.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub frequency: Frequency,
    pub anchor_day: AnchorDay,
}

impl RecurrenceSpec {
    pub fn new(frequency: Frequency, anchor_day: i64) -> Result<Self> {
        Ok(Self {
            frequency,
            anchor_day: AnchorDay::new(anchor_day)?,
        })
    }

    /// Recurrence stored on an obligation type (`recurrence` text + `due_day`)
    pub fn from_type(recurrence: &str, due_day: i64) -> Result<Self> {
        Self::new(recurrence.parse()?, due_day)
    }
}

/// Identity of one recurrence stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObligationKey {
    pub company_id: i64,
    pub jurisdiction: String,
    pub obligation_type_id: i64,
    /// Optional name filter; `None` matches any name
    pub obligation_name: Option<String>,
}

impl ObligationKey {
    pub fn new(company_id: i64, jurisdiction: impl Into<String>, obligation_type_id: i64) -> Self {
        Self {
            company_id,
            jurisdiction: jurisdiction.into(),
            obligation_type_id,
            obligation_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.obligation_name = Some(name.into());
        self
    }
}

impl fmt::Display for ObligationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "company {} / {} / type {}",
            self.company_id, self.jurisdiction, self.obligation_type_id
        )?;
        if let Some(name) = &self.obligation_name {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

/// One dated instance of a recurring obligation
///
/// `competence` is kept as text because stored history may carry any of the
/// accepted forms; everything the engine produces is `MM/YYYY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationOccurrence {
    pub key: ObligationKey,
    pub competence: String,
    pub due_date: NaiveDate,
    pub delivery_deadline: Option<NaiveDate>,
}

impl ObligationOccurrence {
    /// Signed days from due date to delivery deadline
    pub fn deadline_offset_days(&self) -> Option<i64> {
        self.delivery_deadline
            .map(|deadline| (deadline - self.due_date).num_days())
    }

    /// The dates this occurrence contributes to the next chain step
    pub fn as_seed(&self) -> Seed {
        Seed {
            competence: self.competence.clone(),
            due_date: self.due_date,
            delivery_deadline: self.delivery_deadline,
        }
    }
}

/// Starting point of a chain: explicit bootstrap values or an existing occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    pub competence: String,
    pub due_date: NaiveDate,
    pub delivery_deadline: Option<NaiveDate>,
}

impl Seed {
    pub fn new(competence: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            competence: competence.into(),
            due_date,
            delivery_deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.delivery_deadline = Some(deadline);
        self
    }
}

/// Preview output: a computed occurrence and whether it is already persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateOccurrence {
    #[serde(flatten)]
    pub occurrence: ObligationOccurrence,
    pub conflicts: bool,
}

/// A competence a commit did not write, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCompetence {
    pub competence: String,
    pub reason: String,
}

/// Which base a chain started from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BaseUsed {
    Existing {
        id: i64,
        competence: String,
        due_date: NaiveDate,
    },
    Manual {
        competence: String,
        due_date: NaiveDate,
    },
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(RecurrenceError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// `months` calendar months starting at `start`
    pub fn months_ahead(start: NaiveDate, months: u32) -> Result<Self> {
        let end = calendar::add_months_with_clamp(start, months as i32)?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Overlap with another window (e.g. an obligation's validity period)
    pub fn intersect(&self, other: &DateWindow) -> Option<DateWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateWindow { start, end })
    }
}
