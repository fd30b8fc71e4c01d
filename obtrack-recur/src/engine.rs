//! Recurrence engine
//!
//! Two generation modes:
//! - **Chain mode** (`preview_sequence`, `commit_sequence`): walk forward from
//!   the latest occurrence of a key (or an explicit seed), one competence
//!   month per step, due date on the anchor day of the following
//!   month, delivery deadline at the base's day offset.
//! - **Window mode** (`generate_for_window`): every due date the frequency
//!   yields inside a date window, competence taken from the due date's month.
//!
//! The engine holds no state between calls. Within one chain call the
//! current base is rebound on every step, so a conflict never stalls the
//! chain: it only decides whether a write happens.

use crate::calendar;
use crate::competence::Competence;
use crate::error::{RecurrenceError, Result};
use crate::store::{CreateOutcome, NewOccurrence, ObligationStore, StoredOccurrence};
use crate::types::{
    AnchorDay, BaseUsed, CandidateOccurrence, DateWindow, ObligationKey, ObligationOccurrence,
    RecurrenceSpec, Seed, SkippedCompetence,
};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

/// Skip reason recorded for competences that already exist
pub const CONFLICT_REASON: &str = "already exists for this competence";

/// Compute the occurrence following `base`
///
/// Competence advances exactly one month whatever the frequency; the due
/// date moves to the next month on `anchor_day` (clamped); the delivery
/// deadline keeps the base's signed day offset from its due date.
pub fn compute_next_occurrence(
    key: &ObligationKey,
    base: &Seed,
    anchor_day: AnchorDay,
) -> Result<ObligationOccurrence> {
    let competence = Competence::parse(&base.competence)?.succ()?;

    let next_month = calendar::add_months_with_clamp(calendar::month_start(base.due_date), 1)?;
    let due_date = calendar::anchored_date(next_month.year(), next_month.month(), anchor_day.get())?;

    let delivery_deadline = base
        .delivery_deadline
        .map(|deadline| calendar::add_days(due_date, (deadline - base.due_date).num_days()))
        .transpose()?;

    Ok(ObligationOccurrence {
        key: key.clone(),
        competence: competence.to_string(),
        due_date,
        delivery_deadline,
    })
}

/// Latest persisted occurrence for the key (store ordering contract applies)
pub async fn find_latest_occurrence<S>(store: &S, key: &ObligationKey) -> Result<Option<StoredOccurrence>>
where
    S: ObligationStore + ?Sized,
{
    Ok(store.find_latest_occurrence(key).await?)
}

/// Where a chain stopped early
#[derive(Debug)]
pub struct ChainHalt {
    /// 1-based step that failed
    pub iteration: usize,
    pub error: RecurrenceError,
}

#[derive(Debug)]
pub struct SequencePreview {
    pub base_used: BaseUsed,
    pub proposed: Vec<CandidateOccurrence>,
    pub halted: Option<ChainHalt>,
}

#[derive(Debug)]
pub struct SequenceCommit {
    pub base_used: BaseUsed,
    pub created: Vec<StoredOccurrence>,
    pub skipped: Vec<SkippedCompetence>,
    pub halted: Option<ChainHalt>,
}

impl SequenceCommit {
    pub fn last_created(&self) -> Option<&StoredOccurrence> {
        self.created.last()
    }
}

/// Values stamped on rows created by `commit_sequence`
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Used when neither the key nor the base carries an obligation name
    pub default_name: Option<String>,
    pub validity_start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Successive occurrences from a starting base
///
/// Yields at most `remaining` items and nothing after the first error.
struct Chain<'a> {
    key: &'a ObligationKey,
    anchor_day: AnchorDay,
    remaining: usize,
    current: Option<Seed>,
}

impl<'a> Chain<'a> {
    fn new(key: &'a ObligationKey, anchor_day: AnchorDay, count: usize, start: Seed) -> Self {
        Self {
            key,
            anchor_day,
            remaining: count,
            current: Some(start),
        }
    }
}

impl Iterator for Chain<'_> {
    type Item = Result<ObligationOccurrence>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let base = self.current.take()?;
        self.remaining -= 1;

        match compute_next_occurrence(self.key, &base, self.anchor_day) {
            Ok(next) => {
                self.current = Some(next.as_seed());
                Some(Ok(next))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Latest occurrence if any, else the seed; `MissingSeed` when neither exists
async fn resolve_base<S>(
    store: &S,
    key: &ObligationKey,
    seed: Option<&Seed>,
) -> Result<(Option<StoredOccurrence>, BaseUsed, Seed)>
where
    S: ObligationStore + ?Sized,
{
    if let Some(latest) = store.find_latest_occurrence(key).await? {
        let base_used = BaseUsed::Existing {
            id: latest.id,
            competence: latest.occurrence.competence.clone(),
            due_date: latest.occurrence.due_date,
        };
        let start = latest.occurrence.as_seed();
        return Ok((Some(latest), base_used, start));
    }

    let seed = seed.ok_or_else(|| RecurrenceError::MissingSeed(key.to_string()))?;
    let base_used = BaseUsed::Manual {
        competence: seed.competence.clone(),
        due_date: seed.due_date,
    };
    Ok((None, base_used, seed.clone()))
}

/// Propose the next `count` occurrences without writing anything
///
/// Each candidate is flagged when its competence already exists. A
/// competence or date failure mid-chain ends the preview but keeps the
/// candidates computed before it (see [`SequencePreview::halted`]).
pub async fn preview_sequence<S>(
    store: &S,
    key: &ObligationKey,
    spec: &RecurrenceSpec,
    count: usize,
    seed: Option<&Seed>,
) -> Result<SequencePreview>
where
    S: ObligationStore + ?Sized,
{
    let (_, base_used, start) = resolve_base(store, key, seed).await?;
    let mut proposed = Vec::new();
    let mut halted = None;

    for (index, step) in Chain::new(key, spec.anchor_day, count, start).enumerate() {
        match step {
            Ok(occurrence) => {
                let conflicts = store.exists_occurrence(key, &occurrence.competence).await?;
                debug!(
                    "Preview {} step {}: {} due {} (conflicts: {})",
                    key,
                    index + 1,
                    occurrence.competence,
                    occurrence.due_date,
                    conflicts
                );
                proposed.push(CandidateOccurrence { occurrence, conflicts });
            }
            Err(error) if error.halts_chain() => {
                halted = Some(ChainHalt {
                    iteration: index + 1,
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }

    Ok(SequencePreview {
        base_used,
        proposed,
        halted,
    })
}

/// Persist the next `count` occurrences, skipping competences that exist
///
/// Run this against a transactional store so concurrent commits for the
/// same key cannot both create one competence; the loser sees
/// `AlreadyExists` and records a skip. Partial success is normal.
pub async fn commit_sequence<S>(
    store: &S,
    key: &ObligationKey,
    spec: &RecurrenceSpec,
    count: usize,
    seed: Option<&Seed>,
    options: &CommitOptions,
) -> Result<SequenceCommit>
where
    S: ObligationStore + ?Sized,
{
    let (latest, base_used, start) = resolve_base(store, key, seed).await?;

    let obligation_name = key
        .obligation_name
        .clone()
        .or_else(|| latest.and_then(|l| l.obligation_name))
        .or_else(|| options.default_name.clone());

    let mut created = Vec::new();
    let mut skipped = Vec::new();
    let mut halted = None;

    for (index, step) in Chain::new(key, spec.anchor_day, count, start).enumerate() {
        let occurrence = match step {
            Ok(occurrence) => occurrence,
            Err(error) if error.halts_chain() => {
                halted = Some(ChainHalt {
                    iteration: index + 1,
                    error,
                });
                continue;
            }
            Err(error) => return Err(error),
        };

        if store.exists_occurrence(key, &occurrence.competence).await? {
            debug!("Skipping {} {}: {}", key, occurrence.competence, CONFLICT_REASON);
            skipped.push(SkippedCompetence {
                competence: occurrence.competence,
                reason: CONFLICT_REASON.to_string(),
            });
            continue;
        }

        let competence = occurrence.competence.clone();
        let new = NewOccurrence {
            occurrence,
            obligation_name: obligation_name.clone(),
            validity_start_date: options.validity_start_date,
            validity_end_date: None,
            notes: options.notes.clone(),
        };

        match store.create_occurrence(key, &new).await? {
            CreateOutcome::Created(stored) => {
                debug!("Created {} {} (id {})", key, competence, stored.id);
                created.push(stored);
            }
            CreateOutcome::AlreadyExists => {
                warn!("{} {} was created concurrently; skipping", key, competence);
                skipped.push(SkippedCompetence {
                    competence,
                    reason: CONFLICT_REASON.to_string(),
                });
            }
        }
    }

    Ok(SequenceCommit {
        base_used,
        created,
        skipped,
        halted,
    })
}

/// Due dates the frequency yields inside the window
///
/// Walks from the first day of the window's start month in steps of
/// `frequency.month_step()` months; each step's due date is the anchor day
/// (clamped) and is kept only when it falls inside the window.
pub fn window_due_dates(spec: &RecurrenceSpec, window: &DateWindow) -> Result<Vec<NaiveDate>> {
    let step = spec.frequency.month_step() as i32;
    let mut dates = Vec::new();
    let mut cursor = calendar::month_start(window.start);

    while cursor <= window.end {
        let due_date = calendar::anchored_date(cursor.year(), cursor.month(), spec.anchor_day.get())?;
        if window.contains(due_date) {
            dates.push(due_date);
        }
        // No representable month follows the calendar's last one
        cursor = match calendar::add_months_with_clamp(cursor, step) {
            Ok(next) => next,
            Err(_) => break,
        };
    }

    Ok(dates)
}

/// Occurrences for every due date in the window that is not yet persisted
///
/// Delivery deadlines keep `reference`'s offset when it has one, otherwise
/// use the frequency's fallback offset. Nothing is written; the caller
/// persists the result.
pub async fn generate_for_window<S>(
    store: &S,
    key: &ObligationKey,
    spec: &RecurrenceSpec,
    window: &DateWindow,
    reference: Option<&ObligationOccurrence>,
) -> Result<Vec<ObligationOccurrence>>
where
    S: ObligationStore + ?Sized,
{
    let offset_days = reference
        .and_then(ObligationOccurrence::deadline_offset_days)
        .unwrap_or_else(|| spec.frequency.fallback_deadline_days());

    let mut generated = Vec::new();
    for due_date in window_due_dates(spec, window)? {
        let competence = Competence::of_date(due_date).to_string();
        if store.exists_occurrence(key, &competence).await? {
            debug!("Window {}: {} already exists", key, competence);
            continue;
        }

        generated.push(ObligationOccurrence {
            key: key.clone(),
            competence,
            due_date,
            delivery_deadline: Some(calendar::add_days(due_date, offset_days)?),
        });
    }

    Ok(generated)
}
