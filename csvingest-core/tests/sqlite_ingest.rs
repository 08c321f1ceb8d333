//! End-to-end ingestion tests against SQLite files.
//!
//! This test suite covers:
//! - The five-row sample round trip with exact values
//! - All-or-nothing behaviour for schema and conversion failures
//! - NULL storage for blank text cells
//! - Idempotent table provisioning
//! - Existing tables with an incompatible layout
//! - A call timeout while the database is locked commits nothing
//! - Name search over ingested rows
//! - Strict content rules
//!
//! Note: each test gets its own database file in a temporary directory, so no
//! containers are needed.

#![cfg(feature = "sqlite")]

use csvingest_core::{
    DEFAULT_SEARCH_LIMIT, IngestOptions, NumericBounds, Payload, Status, Target, check_payload,
    ingest, search,
};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, Row};
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE: &str = "name,salary,address,gpa,school
Alice Johnson,50000,123 Main St,3.8,State University
Bob Smith,60000,456 Oak Ave,3.5,Tech Institute
Charlie Brown,55000,789 Pine Rd,3.9,City College
Diana Prince,70000,321 Elm St,4.0,Harvard
Eve Wilson,45000,654 Maple Ave,3.6,Stanford
";

type Row5 = (
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<f64>,
    Option<String>,
);

/// A database file inside a temporary directory that lives as long as the value.
struct TestDatabase {
    _dir: TempDir,
    url: String,
}

impl TestDatabase {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ingest.db").display());
        Self { _dir: dir, url }
    }

    fn target(&self) -> Target {
        Target::Sqlite(self.url.clone())
    }

    async fn connect(&self) -> SqliteConnection {
        SqliteConnection::connect(&self.url).await.unwrap()
    }

    async fn row_count(&self, table: &str) -> i64 {
        let mut conn = self.connect().await;
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut conn)
            .await
            .unwrap()
    }

    async fn rows(&self) -> Vec<Row5> {
        let mut conn = self.connect().await;
        sqlx::query_as(
            "SELECT name, CAST(salary AS REAL), address, CAST(gpa AS REAL), school
             FROM csv_data ORDER BY id",
        )
        .fetch_all(&mut conn)
        .await
        .unwrap()
    }
}

#[tokio::test]
async fn test_sample_round_trip() {
    let db = TestDatabase::new();
    let response = ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    assert_eq!(response.status, Status::Success, "{}", response.message);
    assert_eq!(response.rows_inserted, Some(5));

    let rows = db.rows().await;
    let expected = [
        ("Alice Johnson", 50000.0, 3.8, "State University"),
        ("Bob Smith", 60000.0, 3.5, "Tech Institute"),
        ("Charlie Brown", 55000.0, 3.9, "City College"),
        ("Diana Prince", 70000.0, 4.0, "Harvard"),
        ("Eve Wilson", 45000.0, 3.6, "Stanford"),
    ];
    assert_eq!(rows.len(), expected.len());
    for (row, (name, salary, gpa, school)) in rows.iter().zip(expected) {
        assert_eq!(row.0.as_deref(), Some(name));
        assert_eq!(row.1, Some(salary));
        assert_eq!(row.3, Some(gpa));
        assert_eq!(row.4.as_deref(), Some(school));
    }
}

#[tokio::test]
async fn test_created_at_defaults_to_insert_time() {
    let db = TestDatabase::new();
    ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    let mut conn = db.connect().await;
    let missing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM csv_data WHERE created_at IS NULL")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(missing, 0);

    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM csv_data ORDER BY id")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_missing_columns_leave_table_unchanged() {
    let db = TestDatabase::new();
    ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    let response = ingest(
        Payload::Text("name,salary,school\nAlice,50000,State University\n"),
        &db.target(),
        &IngestOptions::default(),
    )
    .await;

    assert_eq!(response.status, Status::Error);
    assert_eq!(response.message, "CSV missing columns: address, gpa");
    assert_eq!(response.rows_inserted, None);
    assert_eq!(db.row_count("csv_data").await, 5);
}

#[tokio::test]
async fn test_missing_columns_never_create_the_table() {
    let db = TestDatabase::new();
    let response = ingest(
        Payload::Text("name,salary,school\nAlice,50000,State University\n"),
        &db.target(),
        &IngestOptions::default(),
    )
    .await;
    assert_eq!(response.status, Status::Error);

    // The database file was never opened, so it does not exist yet.
    let path = db.url.trim_start_matches("sqlite://");
    assert!(!std::path::Path::new(path).exists());
}

#[tokio::test]
async fn test_non_numeric_value_persists_nothing() {
    let db = TestDatabase::new();
    ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    let bad = "name,salary,address,gpa,school
Frank,41000,1 Loop Rd,3.1,MIT
Grace,lots,2 Loop Rd,3.2,MIT
";
    let response = ingest(Payload::Text(bad), &db.target(), &IngestOptions::default()).await;

    assert_eq!(response.status, Status::Error);
    assert_eq!(response.error_kind.as_deref(), Some("type_conversion"));
    assert!(response.message.contains("Row 2"));
    assert!(response.message.contains("salary"));
    assert_eq!(db.row_count("csv_data").await, 5);
}

#[tokio::test]
async fn test_gpa_bounds_reject_whole_batch() {
    let db = TestDatabase::new();
    let options = IngestOptions::default().with_gpa_bounds(NumericBounds::new(0.0, 4.0));
    let text = "name,salary,address,gpa,school
Ada,1,x,3.9,MIT
Bea,2,y,4.3,MIT
";

    let response = ingest(Payload::Text(text), &db.target(), &options).await;
    assert_eq!(response.error_kind.as_deref(), Some("out_of_range"));

    let response = ingest(Payload::Text(text), &db.target(), &IngestOptions::default()).await;
    assert_eq!(response.rows_inserted, Some(2));
}

#[tokio::test]
async fn test_blank_text_is_stored_as_null() {
    let db = TestDatabase::new();
    let text = "name,salary,address,gpa,school\n   ,1000,  ,2.5,\t\n";

    let response = ingest(Payload::Text(text), &db.target(), &IngestOptions::default()).await;
    assert_eq!(response.rows_inserted, Some(1));

    let rows = db.rows().await;
    assert_eq!(rows, vec![(None, Some(1000.0), None, Some(2.5), None)]);
}

#[tokio::test]
async fn test_empty_numeric_cells_are_null() {
    let db = TestDatabase::new();
    let text = "name,salary,address,gpa,school\nHal,,Nowhere,,\n";

    ingest(Payload::Text(text), &db.target(), &IngestOptions::default()).await;

    let rows = db.rows().await;
    assert_eq!(rows[0].1, None);
    assert_eq!(rows[0].3, None);
    assert_eq!(rows[0].2.as_deref(), Some("Nowhere"));
}

#[tokio::test]
async fn test_two_calls_create_one_table() {
    let db = TestDatabase::new();
    for _ in 0..2 {
        let response = ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;
        assert_eq!(response.rows_inserted, Some(5), "{}", response.message);
    }

    let mut conn = db.connect().await;
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'csv_data'",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(tables, 1);
    assert_eq!(db.row_count("csv_data").await, 10);
}

#[tokio::test]
async fn test_custom_table_name() {
    let db = TestDatabase::new();
    let options = IngestOptions::default().with_table("people_2024");

    let response = ingest(Payload::Text(SAMPLE), &db.target(), &options).await;
    assert_eq!(response.table.as_deref(), Some("people_2024"));
    assert_eq!(db.row_count("people_2024").await, 5);
}

#[tokio::test]
async fn test_incompatible_existing_table_surfaces_database_error() {
    let db = TestDatabase::new();
    {
        let mut conn = SqliteConnection::connect(&format!("{}?mode=rwc", db.url))
            .await
            .unwrap();
        sqlx::query("CREATE TABLE csv_data (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
    }

    let response = ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    assert_eq!(response.status, Status::Error);
    assert_eq!(response.error_kind.as_deref(), Some("persistence"));
    assert!(response.message.contains("salary"), "{}", response.message);

    let mut conn = db.connect().await;
    let columns: Vec<String> = sqlx::query("SELECT name FROM pragma_table_info('csv_data')")
        .fetch_all(&mut conn)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>(0))
        .collect();
    assert_eq!(columns, vec!["id", "name"]);
}

#[tokio::test]
async fn test_bytes_payload_with_bom() {
    let db = TestDatabase::new();
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(SAMPLE.as_bytes());

    let response = ingest(Payload::from(&bytes), &db.target(), &IngestOptions::default()).await;
    assert_eq!(response.rows_inserted, Some(5), "{}", response.message);
}

#[test]
fn test_check_payload_counts_without_database() {
    let report = check_payload(Payload::Text(SAMPLE), &IngestOptions::default()).unwrap();
    assert_eq!(report.rows, 5);
    assert_eq!(report.columns, 5);
}

#[tokio::test]
async fn test_timeout_while_locked_commits_nothing() {
    let db = TestDatabase::new();
    ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    // Hold the write lock from another connection so the insert blocks.
    let mut holder = db.connect().await;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut holder)
        .await
        .unwrap();

    let options = IngestOptions::default().with_timeout(Duration::from_millis(500));
    let response = ingest(Payload::Text(SAMPLE), &db.target(), &options).await;

    assert_eq!(response.status, Status::Error);
    assert_eq!(response.error_kind.as_deref(), Some("timeout"), "{}", response.message);
    assert_eq!(response.rows_inserted, None);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM csv_data")
        .fetch_one(&mut holder)
        .await
        .unwrap();
    assert_eq!(count, 5);

    sqlx::query("ROLLBACK").execute(&mut holder).await.unwrap();
    holder.close().await.unwrap();
    assert_eq!(db.row_count("csv_data").await, 5);
}

#[tokio::test]
async fn test_search_finds_ingested_rows() {
    let db = TestDatabase::new();
    ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    let response = search("ali", &db.target(), &IngestOptions::default(), DEFAULT_SEARCH_LIMIT).await;

    assert_eq!(response.status, Status::Success, "{}", response.message);
    assert_eq!(response.message, "Found 1 record(s) for 'ali'");
    assert_eq!(response.count, Some(1));
    let results = response.results.unwrap();
    let alice = &results[0];
    assert_eq!(alice.id, 1);
    assert_eq!(alice.record.name.as_deref(), Some("Alice Johnson"));
    assert_eq!(alice.record.salary, Some(50000.0));
    assert_eq!(alice.record.address.as_deref(), Some("123 Main St"));
    assert_eq!(alice.record.gpa, Some(3.8));
    assert_eq!(alice.record.school.as_deref(), Some("State University"));
    assert!(alice.created_at.is_some());
}

#[tokio::test]
async fn test_search_newest_first_with_limit() {
    let db = TestDatabase::new();
    for _ in 0..2 {
        ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;
    }

    let response = search(" e ", &db.target(), &IngestOptions::default(), 3).await;
    let ids: Vec<i64> = response.results.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![10, 9, 8]);
}

#[tokio::test]
async fn test_search_without_matches() {
    let db = TestDatabase::new();
    ingest(Payload::Text(SAMPLE), &db.target(), &IngestOptions::default()).await;

    let response = search("Zed", &db.target(), &IngestOptions::default(), DEFAULT_SEARCH_LIMIT).await;
    assert_eq!(response.status, Status::Success);
    assert_eq!(response.message, "No records found for \"Zed\"");
    assert_eq!(response.count, Some(0));
}

#[tokio::test]
async fn test_strict_rules_reject_before_any_write() {
    let db = TestDatabase::new();
    let text = "name,salary,address,gpa,school\nAda,-5,1 Loop Rd,3.0,MIT\n";
    let options = IngestOptions::default().with_strict_check();

    let response = ingest(Payload::Text(text), &db.target(), &options).await;
    assert_eq!(response.message, "Salary must be greater than 0");
    assert_eq!(response.error_kind.as_deref(), Some("validation"));

    let response = ingest(Payload::Text(SAMPLE), &db.target(), &options).await;
    assert_eq!(response.rows_inserted, Some(5), "{}", response.message);
}
