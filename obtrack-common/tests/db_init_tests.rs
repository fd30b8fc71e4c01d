//! Database initialization on disk
//!
//! Covers first-run creation, reopening an existing file and the uniqueness
//! constraint that guards one obligation per competence.

use obtrack_common::db::{
    init_database, schema_version, upsert_company, upsert_obligation_type, Company,
    ObligationType, CURRENT_SCHEMA_VERSION,
};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("obtrack.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("obtrack.db");

    let pool1 = init_database(&db_path).await.unwrap();
    upsert_company(
        &pool1,
        &Company {
            id: 1,
            code: "ACME".to_string(),
            name: "Acme Ltda".to_string(),
            active: true,
        },
    )
    .await
    .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "existing rows must survive reopening");
    assert_eq!(schema_version(&pool2).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_obligation_competence_unique_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("obtrack.db")).await.unwrap();

    upsert_company(
        &pool,
        &Company {
            id: 1,
            code: "ACME".to_string(),
            name: "Acme Ltda".to_string(),
            active: true,
        },
    )
    .await
    .unwrap();
    upsert_obligation_type(
        &pool,
        &ObligationType {
            id: 7,
            name: "GIA".to_string(),
            description: None,
            recurrence: "mensal".to_string(),
            due_day: 10,
        },
    )
    .await
    .unwrap();

    let insert = r#"
        INSERT INTO obligations (company_id, jurisdiction_code, obligation_type_id, competence, due_date, created_at)
        VALUES (1, 'SP', 7, '01/2024', '2024-02-10', '2024-01-01T00:00:00Z')
    "#;
    sqlx::query(insert).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).execute(&pool).await;
    assert!(duplicate.is_err(), "second insert for the same competence must fail");
}

#[tokio::test]
async fn test_obligation_requires_known_jurisdiction() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("obtrack.db")).await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO obligations (company_id, jurisdiction_code, obligation_type_id, competence, due_date, created_at)
        VALUES (1, 'XX', 7, '01/2024', '2024-02-10', '2024-01-01T00:00:00Z')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "foreign keys must be enforced");
}
