//! Database initialization
//!
//! Opens (or creates) the SQLite file, applies connection pragmas and creates
//! every table idempotently. Safe to run on every startup.

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

/// Current schema version
///
/// **IMPORTANT:** Increment this when the schema changes
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Jurisdictions seeded on first run (Brazilian federative units)
const DEFAULT_JURISDICTIONS: &[(&str, &str)] = &[
    ("AC", "Acre"),
    ("AL", "Alagoas"),
    ("AP", "Amapá"),
    ("AM", "Amazonas"),
    ("BA", "Bahia"),
    ("CE", "Ceará"),
    ("DF", "Distrito Federal"),
    ("ES", "Espírito Santo"),
    ("GO", "Goiás"),
    ("MA", "Maranhão"),
    ("MT", "Mato Grosso"),
    ("MS", "Mato Grosso do Sul"),
    ("MG", "Minas Gerais"),
    ("PA", "Pará"),
    ("PB", "Paraíba"),
    ("PR", "Paraná"),
    ("PE", "Pernambuco"),
    ("PI", "Piauí"),
    ("RJ", "Rio de Janeiro"),
    ("RN", "Rio Grande do Norte"),
    ("RS", "Rio Grande do Sul"),
    ("RO", "Rondônia"),
    ("RR", "Roraima"),
    ("SC", "Santa Catarina"),
    ("SP", "São Paulo"),
    ("SE", "Sergipe"),
    ("TO", "Tocantins"),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets readers proceed while a commit holds the write lock
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// `sqlite::memory:` is per connection, so the pool is capped at one.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent) and seed default jurisdictions
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_jurisdictions_table(pool).await?;
    create_companies_table(pool).await?;
    create_obligation_types_table(pool).await?;
    create_obligations_table(pool).await?;

    seed_jurisdictions(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    debug!("Schema ready at version {}", CURRENT_SCHEMA_VERSION);
    Ok(())
}

/// Latest recorded schema version (0 if none)
pub async fn schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_jurisdictions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jurisdictions (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_companies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_obligation_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS obligation_types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            recurrence TEXT NOT NULL DEFAULT 'mensal',
            due_day INTEGER NOT NULL DEFAULT 1 CHECK (due_day BETWEEN 1 AND 31)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Obligation occurrences
///
/// `competence` is stored canonical (`MM/YYYY`); `competence_period` is
/// `year * 100 + month` so ordering by period is numeric. The UNIQUE
/// constraint is what makes concurrent creates for one competence safe.
async fn create_obligations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS obligations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            jurisdiction_code TEXT NOT NULL REFERENCES jurisdictions(code) ON DELETE CASCADE,
            obligation_type_id INTEGER NOT NULL REFERENCES obligation_types(id) ON DELETE CASCADE,
            obligation_name TEXT,
            competence TEXT NOT NULL,
            competence_period INTEGER,
            due_date TEXT NOT NULL,
            delivery_deadline TEXT,
            validity_start_date TEXT,
            validity_end_date TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (company_id, jurisdiction_code, obligation_type_id, competence)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_obligations_key ON obligations(company_id, jurisdiction_code, obligation_type_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_obligations_due_date ON obligations(due_date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn seed_jurisdictions(pool: &SqlitePool) -> Result<()> {
    for (code, name) in DEFAULT_JURISDICTIONS {
        sqlx::query("INSERT OR IGNORE INTO jurisdictions (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in ["companies", "jurisdictions", "obligation_types", "obligations"] {
            assert!(
                tables.iter().any(|t| t == expected),
                "missing table {}",
                expected
            );
        }
    }

    #[tokio::test]
    async fn test_jurisdictions_seeded_once() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jurisdictions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, DEFAULT_JURISDICTIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_schema_version_recorded() {
        let pool = init_memory_database().await.unwrap();
        assert_eq!(schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
