//! obtrack-recur - Recurring obligation engine
//!
//! Generates the dated occurrences of recurring regulatory obligations for a
//! `(company, jurisdiction, obligation type)` key:
//! - chain mode: one competence month at a time from the latest occurrence
//!   (or a seed), with preview and transactional commit
//! - window mode: every due date a frequency yields inside a date range
//!
//! Day-of-month clamping, competence parsing and deduplication against the
//! store live here; persistence goes through [`store::ObligationStore`].

pub mod calendar;
pub mod competence;
pub mod db;
pub mod engine;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

pub use competence::Competence;
pub use error::{RecurrenceError, Result};
pub use service::{
    GenerateResponse, PlanFilter, PlanSummary, PreviewResponse, RecurrenceService, SequenceRequest,
};
pub use store::{CreateOutcome, NewOccurrence, ObligationStore, StoredOccurrence};
pub use types::{
    AnchorDay, BaseUsed, CandidateOccurrence, DateWindow, Frequency, ObligationKey, ObligationOccurrence,
    RecurrenceSpec, Seed, SkippedCompetence,
};
