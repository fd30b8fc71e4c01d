//! Catalog queries: jurisdictions, companies and obligation types

use crate::db::models::{Company, Jurisdiction, ObligationType};
use crate::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Insert or update a jurisdiction
pub async fn upsert_jurisdiction(pool: &SqlitePool, code: &str, name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jurisdictions (code, name) VALUES (?, ?)
        ON CONFLICT(code) DO UPDATE SET name = excluded.name
        "#,
    )
    .bind(code)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or update a company with an explicit id
pub async fn upsert_company(pool: &SqlitePool, company: &Company) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO companies (id, code, name, active) VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            code = excluded.code,
            name = excluded.name,
            active = excluded.active
        "#,
    )
    .bind(company.id)
    .bind(&company.code)
    .bind(&company.name)
    .bind(company.active)
    .execute(pool)
    .await?;

    debug!("Upserted company {} [{}]", company.id, company.code);
    Ok(())
}

/// Insert or update an obligation type with an explicit id
pub async fn upsert_obligation_type(pool: &SqlitePool, obligation_type: &ObligationType) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO obligation_types (id, name, description, recurrence, due_day)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            recurrence = excluded.recurrence,
            due_day = excluded.due_day
        "#,
    )
    .bind(obligation_type.id)
    .bind(&obligation_type.name)
    .bind(&obligation_type.description)
    .bind(&obligation_type.recurrence)
    .bind(obligation_type.due_day)
    .execute(pool)
    .await?;

    debug!("Upserted obligation type {} ({})", obligation_type.id, obligation_type.name);
    Ok(())
}

pub async fn get_jurisdiction(pool: &SqlitePool, code: &str) -> Result<Option<Jurisdiction>> {
    let row = sqlx::query_as::<_, Jurisdiction>("SELECT code, name FROM jurisdictions WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_company(pool: &SqlitePool, id: i64) -> Result<Option<Company>> {
    let row = sqlx::query_as::<_, Company>("SELECT id, code, name, active FROM companies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_obligation_type(pool: &SqlitePool, id: i64) -> Result<Option<ObligationType>> {
    let row = sqlx::query_as::<_, ObligationType>(
        "SELECT id, name, description, recurrence, due_day FROM obligation_types WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Company by id, `NotFound` when missing
pub async fn require_company(pool: &SqlitePool, id: i64) -> Result<Company> {
    get_company(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("company {}", id)))
}

pub async fn require_jurisdiction(pool: &SqlitePool, code: &str) -> Result<Jurisdiction> {
    get_jurisdiction(pool, code)
        .await?
        .ok_or_else(|| Error::NotFound(format!("jurisdiction {}", code)))
}

pub async fn require_obligation_type(pool: &SqlitePool, id: i64) -> Result<ObligationType> {
    get_obligation_type(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("obligation type {}", id)))
}

/// Active companies ordered by code, optionally restricted to one id
pub async fn list_active_companies(pool: &SqlitePool, only_id: Option<i64>) -> Result<Vec<Company>> {
    let rows = sqlx::query_as::<_, Company>(
        r#"
        SELECT id, code, name, active FROM companies
        WHERE active = 1 AND (?1 IS NULL OR id = ?1)
        ORDER BY code
        "#,
    )
    .bind(only_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_jurisdictions(pool: &SqlitePool) -> Result<Vec<Jurisdiction>> {
    let rows = sqlx::query_as::<_, Jurisdiction>("SELECT code, name FROM jurisdictions ORDER BY code")
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn list_obligation_types(pool: &SqlitePool) -> Result<Vec<ObligationType>> {
    let rows = sqlx::query_as::<_, ObligationType>(
        "SELECT id, name, description, recurrence, due_day FROM obligation_types ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    fn company(id: i64, code: &str, active: bool) -> Company {
        Company {
            id,
            code: code.to_string(),
            name: format!("Company {}", code),
            active,
        }
    }

    #[tokio::test]
    async fn test_company_upsert_and_lookup() {
        let pool = init_memory_database().await.unwrap();
        upsert_company(&pool, &company(1, "ACME", true)).await.unwrap();
        upsert_company(&pool, &company(1, "ACME", false)).await.unwrap();

        let found = get_company(&pool, 1).await.unwrap().unwrap();
        assert_eq!(found.code, "ACME");
        assert!(!found.active);
        assert!(get_company(&pool, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_companies_filters() {
        let pool = init_memory_database().await.unwrap();
        upsert_company(&pool, &company(1, "B", true)).await.unwrap();
        upsert_company(&pool, &company(2, "A", true)).await.unwrap();
        upsert_company(&pool, &company(3, "C", false)).await.unwrap();

        let all = list_active_companies(&pool, None).await.unwrap();
        let codes: Vec<_> = all.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B"]);

        let one = list_active_companies(&pool, Some(1)).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, 1);

        assert!(list_active_companies(&pool, Some(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_obligation_type_round_trip() {
        let pool = init_memory_database().await.unwrap();
        let ty = ObligationType {
            id: 7,
            name: "GIA".to_string(),
            description: None,
            recurrence: "trimestral".to_string(),
            due_day: 15,
        };
        upsert_obligation_type(&pool, &ty).await.unwrap();

        assert_eq!(get_obligation_type(&pool, 7).await.unwrap(), Some(ty));
        assert_eq!(list_obligation_types(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_jurisdiction_lookup() {
        let pool = init_memory_database().await.unwrap();
        let sp = get_jurisdiction(&pool, "SP").await.unwrap().unwrap();
        assert_eq!(sp.name, "São Paulo");
        assert!(get_jurisdiction(&pool, "XX").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_require_reports_missing_entries() {
        let pool = init_memory_database().await.unwrap();
        upsert_company(&pool, &company(1, "ACME", true)).await.unwrap();

        assert_eq!(require_company(&pool, 1).await.unwrap().code, "ACME");
        assert_eq!(require_jurisdiction(&pool, "RJ").await.unwrap().name, "Rio de Janeiro");

        let err = require_company(&pool, 2).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref what) if what == "company 2"));
        assert_eq!(err.to_string(), "company 2 not found");

        assert!(matches!(require_jurisdiction(&pool, "XX").await, Err(Error::NotFound(_))));
        assert!(matches!(require_obligation_type(&pool, 9).await, Err(Error::NotFound(_))));
    }
}
