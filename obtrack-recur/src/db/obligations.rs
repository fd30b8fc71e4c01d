//! Obligation occurrence persistence
//!
//! Two [`ObligationStore`] implementations share the same queries:
//! - [`SqliteObligationStore`]: one pooled connection per call, for reads and
//!   single writes.
//! - [`SqliteObligationTx`]: one transaction for a whole commit, so every
//!   existence check sees the chain's earlier writes.
//!
//! Competences are written in canonical `MM/YYYY` form together with a
//! numeric `competence_period` (`year * 100 + month`). Existence checks match
//! on either, so rows imported in another accepted form still count.

use crate::competence::{self, Competence};
use crate::store::{CreateOutcome, NewOccurrence, ObligationStore, StoredOccurrence};
use crate::types::{ObligationKey, ObligationOccurrence};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use obtrack_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

/// Store backed by a connection pool
#[derive(Debug, Clone)]
pub struct SqliteObligationStore {
    pool: SqlitePool,
}

impl SqliteObligationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction
    ///
    /// The write lock is taken immediately: a second commit waits on the busy
    /// timeout here instead of failing later on a stale read snapshot.
    pub async fn begin(&self) -> Result<SqliteObligationTx> {
        let mut tx = self.pool.begin().await?;

        // Same effect as BEGIN IMMEDIATE: a no-op write takes the RESERVED
        // lock before the first read of the chain
        sqlx::query("UPDATE schema_version SET version = version")
            .execute(&mut *tx)
            .await?;

        Ok(SqliteObligationTx { tx: Mutex::new(tx) })
    }
}

/// Store scoped to one open transaction
///
/// Dropping it without [`commit`](Self::commit) rolls everything back.
pub struct SqliteObligationTx {
    tx: Mutex<Transaction<'static, Sqlite>>,
}

impl SqliteObligationTx {
    pub async fn commit(self) -> Result<()> {
        self.tx.into_inner().commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl ObligationStore for SqliteObligationStore {
    async fn find_latest_occurrence(&self, key: &ObligationKey) -> Result<Option<StoredOccurrence>> {
        let mut conn = self.pool.acquire().await?;
        fetch_latest(&mut conn, key).await
    }

    async fn exists_occurrence(&self, key: &ObligationKey, competence: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        competence_exists(&mut conn, key, competence).await
    }

    async fn create_occurrence(&self, key: &ObligationKey, new: &NewOccurrence) -> Result<CreateOutcome> {
        let mut conn = self.pool.acquire().await?;
        insert_if_absent(&mut conn, key, new).await
    }
}

#[async_trait]
impl ObligationStore for SqliteObligationTx {
    async fn find_latest_occurrence(&self, key: &ObligationKey) -> Result<Option<StoredOccurrence>> {
        let mut tx = self.tx.lock().await;
        fetch_latest(&mut tx, key).await
    }

    async fn exists_occurrence(&self, key: &ObligationKey, competence: &str) -> Result<bool> {
        let mut tx = self.tx.lock().await;
        competence_exists(&mut tx, key, competence).await
    }

    async fn create_occurrence(&self, key: &ObligationKey, new: &NewOccurrence) -> Result<CreateOutcome> {
        let mut tx = self.tx.lock().await;
        insert_if_absent(&mut tx, key, new).await
    }
}

/// All occurrences for the key, oldest due date first
pub async fn list_occurrences(pool: &SqlitePool, key: &ObligationKey) -> Result<Vec<StoredOccurrence>> {
    let rows = sqlx::query(
        r#"
        SELECT id, company_id, jurisdiction_code, obligation_type_id, obligation_name,
               competence, due_date, delivery_deadline, created_at
        FROM obligations
        WHERE company_id = ?1 AND jurisdiction_code = ?2 AND obligation_type_id = ?3
          AND (?4 IS NULL OR obligation_name = ?4)
        ORDER BY due_date, competence_period, id
        "#,
    )
    .bind(key.company_id)
    .bind(&key.jurisdiction)
    .bind(key.obligation_type_id)
    .bind(&key.obligation_name)
    .fetch_all(pool)
    .await?;

    rows.iter().map(decode_occurrence).collect()
}

async fn fetch_latest(conn: &mut SqliteConnection, key: &ObligationKey) -> Result<Option<StoredOccurrence>> {
    let row = sqlx::query(
        r#"
        SELECT id, company_id, jurisdiction_code, obligation_type_id, obligation_name,
               competence, due_date, delivery_deadline, created_at
        FROM obligations
        WHERE company_id = ?1 AND jurisdiction_code = ?2 AND obligation_type_id = ?3
          AND (?4 IS NULL OR obligation_name = ?4)
        ORDER BY due_date DESC, competence_period DESC, created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(key.company_id)
    .bind(&key.jurisdiction)
    .bind(key.obligation_type_id)
    .bind(&key.obligation_name)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(decode_occurrence).transpose()
}

/// Uniqueness ignores the obligation name, so existence does too
async fn competence_exists(conn: &mut SqliteConnection, key: &ObligationKey, competence: &str) -> Result<bool> {
    let canonical = competence::canonicalize(competence);
    let period = Competence::parse(competence).ok().map(|c| c.period_key());

    let found: i64 = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM obligations
            WHERE company_id = ? AND jurisdiction_code = ? AND obligation_type_id = ?
              AND (competence = ? OR competence = ? OR competence_period = ?)
        )
        "#,
    )
    .bind(key.company_id)
    .bind(&key.jurisdiction)
    .bind(key.obligation_type_id)
    .bind(competence)
    .bind(&canonical)
    .bind(period)
    .fetch_one(&mut *conn)
    .await?;

    Ok(found != 0)
}

async fn insert_if_absent(
    conn: &mut SqliteConnection,
    key: &ObligationKey,
    new: &NewOccurrence,
) -> Result<CreateOutcome> {
    let competence = competence::canonicalize(&new.occurrence.competence);
    let period = Competence::parse(&competence).ok().map(|c| c.period_key());
    let created_at = time::now();

    let result = sqlx::query(
        r#"
        INSERT INTO obligations (
            company_id, jurisdiction_code, obligation_type_id, obligation_name,
            competence, competence_period, due_date, delivery_deadline,
            validity_start_date, validity_end_date, notes, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(company_id, jurisdiction_code, obligation_type_id, competence) DO NOTHING
        "#,
    )
    .bind(key.company_id)
    .bind(&key.jurisdiction)
    .bind(key.obligation_type_id)
    .bind(&new.obligation_name)
    .bind(&competence)
    .bind(period)
    .bind(new.occurrence.due_date)
    .bind(new.occurrence.delivery_deadline)
    .bind(new.validity_start_date)
    .bind(new.validity_end_date)
    .bind(&new.notes)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!("{} {} already present", key, competence);
        return Ok(CreateOutcome::AlreadyExists);
    }

    let id = result.last_insert_rowid();
    debug!("Inserted obligation {} for {} {}", id, key, competence);

    let mut key = key.clone();
    key.obligation_name = new.obligation_name.clone();

    Ok(CreateOutcome::Created(StoredOccurrence {
        id,
        occurrence: ObligationOccurrence {
            key,
            competence,
            due_date: new.occurrence.due_date,
            delivery_deadline: new.occurrence.delivery_deadline,
        },
        obligation_name: new.obligation_name.clone(),
        created_at,
    }))
}

fn decode_occurrence(row: &SqliteRow) -> Result<StoredOccurrence> {
    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| Error::Internal(format!("Invalid created_at {:?}: {}", created_at_str, e)))?
        .with_timezone(&Utc);

    let obligation_name: Option<String> = row.try_get("obligation_name")?;

    Ok(StoredOccurrence {
        id: row.try_get("id")?,
        occurrence: ObligationOccurrence {
            key: ObligationKey {
                company_id: row.try_get("company_id")?,
                jurisdiction: row.try_get("jurisdiction_code")?,
                obligation_type_id: row.try_get("obligation_type_id")?,
                obligation_name: obligation_name.clone(),
            },
            competence: row.try_get("competence")?,
            due_date: row.try_get("due_date")?,
            delivery_deadline: row.try_get("delivery_deadline")?,
        },
        obligation_name,
        created_at,
    })
}
