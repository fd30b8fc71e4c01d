//! Request-level operations over the engine and the SQLite store
//!
//! The service validates the catalog (company, jurisdiction, obligation
//! type), fills in the recurrence spec from the obligation type when the
//! caller omits it, and runs commits inside one store transaction.

use crate::db::{SqliteObligationStore, SqliteObligationTx};
use crate::engine::{self, ChainHalt, CommitOptions};
use crate::error::Result;
use crate::store::{CreateOutcome, NewOccurrence, ObligationStore, StoredOccurrence};
use crate::types::{
    BaseUsed, CandidateOccurrence, DateWindow, ObligationKey, ObligationOccurrence, RecurrenceSpec, Seed,
    SkippedCompetence,
};
use chrono::NaiveDate;
use obtrack_common::db::{self as catalog, ObligationType};
use obtrack_common::time;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Input shared by preview and generate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRequest {
    pub key: ObligationKey,
    /// Taken from the obligation type when absent
    #[serde(default)]
    pub spec: Option<RecurrenceSpec>,
    #[serde(default = "default_count")]
    pub count: usize,
    /// Required only when the key has no occurrence yet
    #[serde(default)]
    pub seed: Option<Seed>,
}

fn default_count() -> usize {
    3
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub base_used: BaseUsed,
    pub proposed: Vec<CandidateOccurrence>,
    pub count_requested: usize,
    /// Why the chain stopped early, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSummary {
    pub created_count: usize,
    pub skipped_count: usize,
    pub total_requested: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub created: Vec<StoredOccurrence>,
    pub skipped: Vec<SkippedCompetence>,
    pub base_used: BaseUsed,
    pub last_created: Option<StoredOccurrence>,
    pub summary: GenerateSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals of a bulk planning run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub created: usize,
    pub skipped: usize,
}

/// Narrows a planning run; `None` fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFilter {
    pub company_id: Option<i64>,
    pub obligation_type_id: Option<i64>,
    /// State code, compared case-insensitively
    pub jurisdiction: Option<String>,
    /// Case-insensitive fragment of the obligation type name
    pub obligation_name: Option<String>,
}

impl PlanFilter {
    fn matches_jurisdiction(&self, code: &str) -> bool {
        self.jurisdiction
            .as_deref()
            .map_or(true, |wanted| wanted.eq_ignore_ascii_case(code))
    }

    fn matches_type(&self, obligation_type: &ObligationType) -> bool {
        let id_ok = self.obligation_type_id.map_or(true, |id| id == obligation_type.id);
        let name_ok = self.obligation_name.as_deref().map_or(true, |fragment| {
            obligation_type
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
        });
        id_ok && name_ok
    }
}

#[derive(Debug, Clone)]
pub struct RecurrenceService {
    store: SqliteObligationStore,
}

impl RecurrenceService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: SqliteObligationStore::new(pool),
        }
    }

    pub fn store(&self) -> &SqliteObligationStore {
        &self.store
    }

    fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    /// Check the key against the catalog and settle the recurrence
    async fn resolve(&self, key: &ObligationKey, spec: Option<RecurrenceSpec>) -> Result<(ObligationType, RecurrenceSpec)> {
        catalog::require_company(self.pool(), key.company_id).await?;
        catalog::require_jurisdiction(self.pool(), &key.jurisdiction).await?;
        let obligation_type = catalog::require_obligation_type(self.pool(), key.obligation_type_id).await?;

        let spec = match spec {
            Some(spec) => spec,
            None => RecurrenceSpec::from_type(&obligation_type.recurrence, obligation_type.due_day)?,
        };

        Ok((obligation_type, spec))
    }

    /// Candidates the next `count` steps would create; writes nothing
    pub async fn preview(&self, request: &SequenceRequest) -> Result<PreviewResponse> {
        let (_, spec) = self.resolve(&request.key, request.spec).await?;

        let preview = engine::preview_sequence(
            &self.store,
            &request.key,
            &spec,
            request.count,
            request.seed.as_ref(),
        )
        .await?;

        Ok(PreviewResponse {
            base_used: preview.base_used,
            proposed: preview.proposed,
            count_requested: request.count,
            error: preview.halted.as_ref().map(describe_halt),
        })
    }

    /// Create the next `count` occurrences in one transaction
    pub async fn generate(&self, request: &SequenceRequest, today: NaiveDate) -> Result<GenerateResponse> {
        let (obligation_type, spec) = self.resolve(&request.key, request.spec).await?;

        let options = CommitOptions {
            default_name: Some(obligation_type.name.clone()),
            validity_start_date: Some(today),
            notes: Some(format!(
                "generated automatically by recurrence - {}",
                time::format_br_date(today)
            )),
        };

        let tx = self.store.begin().await?;
        let result = engine::commit_sequence(
            &tx,
            &request.key,
            &spec,
            request.count,
            request.seed.as_ref(),
            &options,
        )
        .await?;
        tx.commit().await?;

        info!(
            "Generated {} for {}: {} created, {} skipped",
            obligation_type.name,
            request.key,
            result.created.len(),
            result.skipped.len()
        );

        let last_created = result.last_created().cloned();
        Ok(GenerateResponse {
            summary: GenerateSummary {
                created_count: result.created.len(),
                skipped_count: result.skipped.len(),
                total_requested: request.count,
            },
            error: result.halted.as_ref().map(describe_halt),
            created: result.created,
            skipped: result.skipped,
            base_used: result.base_used,
            last_created,
        })
    }

    /// Occurrences due inside the window that are not yet persisted
    ///
    /// The key's latest occurrence, when present, supplies the delivery
    /// deadline offset. Nothing is written.
    pub async fn generate_window(
        &self,
        key: &ObligationKey,
        spec: Option<RecurrenceSpec>,
        window: &DateWindow,
    ) -> Result<Vec<ObligationOccurrence>> {
        let (_, spec) = self.resolve(key, spec).await?;
        let reference = engine::find_latest_occurrence(&self.store, key).await?;

        engine::generate_for_window(&self.store, key, &spec, window, reference.as_ref().map(|r| &r.occurrence)).await
    }

    /// Persist every due date of the next `months_ahead` months for each
    /// active company, jurisdiction and obligation type the filter keeps
    pub async fn plan_period(&self, months_ahead: u32, filter: &PlanFilter, today: NaiveDate) -> Result<PlanSummary> {
        let window = DateWindow::months_ahead(today, months_ahead)?;
        let companies = catalog::list_active_companies(self.pool(), filter.company_id).await?;
        let jurisdictions: Vec<_> = catalog::list_jurisdictions(self.pool())
            .await?
            .into_iter()
            .filter(|j| filter.matches_jurisdiction(&j.code))
            .collect();
        let obligation_types: Vec<_> = catalog::list_obligation_types(self.pool())
            .await?
            .into_iter()
            .filter(|t| filter.matches_type(t))
            .collect();

        info!(
            "Planning {} to {}: {} companies, {} jurisdictions, {} obligation types",
            window.start,
            window.end,
            companies.len(),
            jurisdictions.len(),
            obligation_types.len()
        );

        let mut summary = PlanSummary::default();
        for obligation_type in &obligation_types {
            let spec = match RecurrenceSpec::from_type(&obligation_type.recurrence, obligation_type.due_day) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!("Skipping obligation type {} ({}): {}", obligation_type.id, obligation_type.name, e);
                    continue;
                }
            };

            for company in &companies {
                for jurisdiction in &jurisdictions {
                    let key = ObligationKey::new(company.id, jurisdiction.code.clone(), obligation_type.id);
                    let tx = self.store.begin().await?;
                    let outcome = plan_key(&tx, &key, obligation_type, &spec, &window).await?;
                    tx.commit().await?;

                    summary.created += outcome.created;
                    summary.skipped += outcome.skipped;
                }
            }
        }

        info!("Planning done: {} created, {} already existed", summary.created, summary.skipped);
        Ok(summary)
    }
}

async fn plan_key(
    tx: &SqliteObligationTx,
    key: &ObligationKey,
    obligation_type: &ObligationType,
    spec: &RecurrenceSpec,
    window: &DateWindow,
) -> Result<PlanSummary> {
    let due_dates = engine::window_due_dates(spec, window)?.len();
    let reference = tx.find_latest_occurrence(key).await?;
    let pending = engine::generate_for_window(tx, key, spec, window, reference.as_ref().map(|r| &r.occurrence)).await?;

    let mut summary = PlanSummary {
        created: 0,
        skipped: due_dates - pending.len(),
    };

    for occurrence in pending {
        let new = NewOccurrence {
            occurrence,
            obligation_name: Some(obligation_type.name.clone()),
            validity_start_date: Some(window.start),
            validity_end_date: Some(window.end),
            notes: Some(format!("generated automatically - {}", obligation_type.recurrence)),
        };
        match tx.create_occurrence(key, &new).await? {
            CreateOutcome::Created(_) => summary.created += 1,
            CreateOutcome::AlreadyExists => summary.skipped += 1,
        }
    }

    Ok(summary)
}

fn describe_halt(halt: &ChainHalt) -> String {
    format!("stopped at iteration {}: {}", halt.iteration, halt.error)
}
