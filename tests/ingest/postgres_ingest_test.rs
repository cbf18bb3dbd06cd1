//! Runs against a live PostgreSQL server named by
//! `RECORDLOOM_TEST_POSTGRES_URL`; skipped when it is unset.

#[path = "../common/mod.rs"]
mod common;

use common::{users, FakeCollection};
use recordloom::config::ConnectionConfig;
use recordloom::db;
use recordloom::ingest::history::read_load;
use recordloom::ingest::{IngestError, IngestOptions, IngestRequest, Ingestor};
use serde_json::json;

const URL_VAR: &str = "RECORDLOOM_TEST_POSTGRES_URL";

fn ingestor(fake: FakeCollection) -> Option<Ingestor> {
    let url = std::env::var(URL_VAR).ok()?;
    let db = db::open(&ConnectionConfig::postgres(url)).unwrap();
    Some(Ingestor::new(db, Box::new(fake), IngestOptions::default()))
}

fn scalar(ingestor: &mut Ingestor, sql: &str) -> Option<String> {
    let rows = ingestor.database_mut().query_strings(sql, &[], 1).unwrap();
    rows.into_iter().next().and_then(|r| r.into_iter().next().flatten())
}

#[test]
fn test_ingest_into_schema() {
    let records = vec![
        json!({"id": "b096504a-3d54-4664-9bf5-1b872466fd66", "tags": ["a", "b"], "count": 3}),
        json!({"id": "2b94c631-fca9-4892-a730-03ee529ffe2a", "tags": [], "count": 4}),
    ];
    let Some(mut ingestor) = ingestor(FakeCollection::new("things", records)) else {
        eprintln!("{} not set, skipping", URL_VAR);
        return;
    };
    let request = IngestRequest::new("recordloom_test.things", "/things").max_depth(2);
    let outcome = ingestor.ingest(&request).unwrap();
    assert_eq!(
        outcome.tables,
        vec![
            "recordloom_test.things",
            "recordloom_test.things__t",
            "recordloom_test.things__t__tags",
            "recordloom_test.things__tcatalog",
        ]
    );
    assert_eq!(
        scalar(
            &mut ingestor,
            "SELECT pg_typeof(id)::text FROM recordloom_test.things__t LIMIT 1"
        )
        .as_deref(),
        Some("uuid")
    );
    assert_eq!(
        scalar(
            &mut ingestor,
            "SELECT string_agg(tags, ',' ORDER BY tags__o) FROM recordloom_test.things__t__tags"
        )
        .as_deref(),
        Some("a,b")
    );

    ingestor.drop_prefix("recordloom_test.things").unwrap();
    assert_eq!(
        read_load(ingestor.database_mut(), "recordloom_test.things").unwrap(),
        None
    );
}

#[test]
fn test_failed_run_rolls_back() {
    let Some(mut ingestor) = ingestor(FakeCollection::new("users", users(4))) else {
        eprintln!("{} not set, skipping", URL_VAR);
        return;
    };
    let request = IngestRequest::new("recordloom_test.rollback_users", "/users");
    ingestor.ingest(&request).unwrap();

    let url = std::env::var(URL_VAR).unwrap();
    let failing = FakeCollection::new("users", users(9)).failing_pages(503);
    let mut bad = Ingestor::new(
        db::open(&ConnectionConfig::postgres(url)).unwrap(),
        Box::new(failing),
        IngestOptions::default(),
    );
    let err = bad.ingest(&request).unwrap_err();
    assert!(matches!(err, IngestError::Fetch(_)));
    assert_eq!(
        scalar(
            &mut ingestor,
            "SELECT count(*)::text FROM recordloom_test.rollback_users__t"
        )
        .as_deref(),
        Some("4")
    );
    ingestor.drop_prefix("recordloom_test.rollback_users").unwrap();
}
