//! Integration tests for database initialization
//!
//! Covers automatic creation, idempotent reopen, schema versioning, the
//! contacts lookup indexes and per-connection pragmas.

use recon_common::db::{get_schema_version, init_database, DatabaseOptions, CURRENT_SCHEMA_VERSION};
use std::time::Duration;
use tempfile::TempDir;

fn options() -> DatabaseOptions {
    DatabaseOptions {
        max_connections: 4,
        lock_wait: Duration::from_millis(1500),
    }
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("contacts.db");

    let result = init_database(&db_path, &options()).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("contacts.db");

    let pool1 = init_database(&db_path, &options()).await.unwrap();
    sqlx::query(
        "INSERT INTO contacts (email, link_precedence, created_at, updated_at)
         VALUES ('a@x', 'primary', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool1)
    .await
    .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path, &options()).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1, "Reopening must not drop existing rows");
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("contacts.db"), &options())
        .await
        .unwrap();

    let version = get_schema_version(&pool).await.unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_contact_indexes_exist() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("contacts.db"), &options())
        .await
        .unwrap();

    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'contacts' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in ["idx_contacts_email", "idx_contacts_linked_id", "idx_contacts_phone"] {
        assert!(
            indexes.iter().any(|name| name == expected),
            "missing index {} in {:?}",
            expected,
            indexes
        );
    }
}

#[tokio::test]
async fn test_precedence_check_constraint() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("contacts.db"), &options())
        .await
        .unwrap();

    let result = sqlx::query(
        "INSERT INTO contacts (email, link_precedence, created_at, updated_at)
         VALUES ('a@x', 'tertiary', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Unknown precedence must be rejected by the schema");
}

#[tokio::test]
async fn test_pragmas_applied_to_connections() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("contacts.db"), &options())
        .await
        .unwrap();

    let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(journal_mode.to_lowercase(), "wal");

    let busy_timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(busy_timeout, 1500);
}
