//! Obligation store contract
//!
//! The engine needs exactly three operations from persistence. Any backend
//! implementing them must honour:
//! - `find_latest_occurrence` order: `due_date` DESC, then competence DESC
//!   (chronological, not textual), then creation time DESC.
//! - `create_occurrence` is create-if-absent per (key, competence): when the
//!   competence already exists (including a row written concurrently by
//!   another commit) it returns [`CreateOutcome::AlreadyExists`] instead of
//!   an error.

use crate::types::{ObligationKey, ObligationOccurrence};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use obtrack_common::Result;
use serde::Serialize;

/// A persisted occurrence with its store metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOccurrence {
    pub id: i64,
    #[serde(flatten)]
    pub occurrence: ObligationOccurrence,
    pub obligation_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything written when an occurrence is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOccurrence {
    pub occurrence: ObligationOccurrence,
    pub obligation_name: Option<String>,
    pub validity_start_date: Option<NaiveDate>,
    pub validity_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl NewOccurrence {
    pub fn new(occurrence: ObligationOccurrence) -> Self {
        Self {
            occurrence,
            obligation_name: None,
            validity_start_date: None,
            validity_end_date: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(StoredOccurrence),
    AlreadyExists,
}

#[async_trait]
pub trait ObligationStore: Send + Sync {
    /// Occurrence furthest in the future for the key, if any
    async fn find_latest_occurrence(&self, key: &ObligationKey) -> Result<Option<StoredOccurrence>>;

    /// Whether the key already has an occurrence for `competence`
    async fn exists_occurrence(&self, key: &ObligationKey, competence: &str) -> Result<bool>;

    /// Persist unless the competence already exists for the key
    async fn create_occurrence(&self, key: &ObligationKey, new: &NewOccurrence) -> Result<CreateOutcome>;
}
