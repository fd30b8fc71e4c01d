//! Error types for the recurrence engine
//!
//! Conflicts are not errors: a competence that already exists is reported
//! per candidate (`conflicts` / skipped list), never through this enum.

use thiserror::Error;

/// Result type for engine and service operations
pub type Result<T> = std::result::Result<T, RecurrenceError>;

#[derive(Debug, Error)]
pub enum RecurrenceError {
    /// Competence text not in `MM/YYYY`, `YYYY-MM[-DD]` or `YYYY?MM...` form,
    /// or outside years 1-9999. Stops a chain but keeps earlier results.
    #[error("invalid competence format: {0:?}")]
    InvalidCompetenceFormat(String),

    /// No prior occurrence for the key and no seed supplied
    #[error("no existing obligation for {0}; a start competence and due date are required")]
    MissingSeed(String),

    #[error("unknown recurrence frequency: {0:?}")]
    UnknownFrequency(String),

    #[error("anchor day must be between 1 and 31, got {0}")]
    InvalidAnchorDay(i64),

    #[error("invalid window: start {start} is after end {end}")]
    InvalidWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Calendar arithmetic left chrono's supported date range
    #[error("date out of range: {0}")]
    DateOutOfRange(String),

    /// Company, jurisdiction or obligation type missing from the catalog
    #[error("not found: {0}")]
    NotFound(String),

    /// Store failure, surfaced as-is
    #[error(transparent)]
    Repository(obtrack_common::Error),
}

impl RecurrenceError {
    /// Errors that end a chain without discarding what it already produced
    pub fn halts_chain(&self) -> bool {
        matches!(
            self,
            RecurrenceError::InvalidCompetenceFormat(_) | RecurrenceError::DateOutOfRange(_)
        )
    }
}

/// Catalog misses keep their own variant; every other store error is a `Repository` error
impl From<obtrack_common::Error> for RecurrenceError {
    fn from(err: obtrack_common::Error) -> Self {
        match err {
            obtrack_common::Error::NotFound(what) => RecurrenceError::NotFound(what),
            other => RecurrenceError::Repository(other),
        }
    }
}

impl From<sqlx::Error> for RecurrenceError {
    fn from(err: sqlx::Error) -> Self {
        RecurrenceError::Repository(obtrack_common::Error::Database(err))
    }
}
