//! End-to-end runs against in-memory DuckDB with a schema-qualified prefix.

#[path = "../common/mod.rs"]
mod common;

use common::{users, FakeCollection};
use recordloom::config::ConnectionConfig;
use recordloom::db;
use recordloom::ingest::history::read_load;
use recordloom::ingest::{IngestOptions, IngestRequest, Ingestor};
use serde_json::json;

fn ingestor(fake: FakeCollection) -> Ingestor {
    let db = db::open(&ConnectionConfig::duckdb(":memory:")).unwrap();
    Ingestor::new(db, Box::new(fake), IngestOptions::default())
}

fn tables_in(ingestor: &mut Ingestor, schema: &str) -> Vec<String> {
    let sql = format!(
        "SELECT table_name FROM information_schema.tables WHERE table_schema = '{}' ORDER BY table_name",
        schema
    );
    ingestor
        .database_mut()
        .query_strings(&sql, &[], 1)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.into_iter().next().flatten())
        .collect()
}

fn scalar(ingestor: &mut Ingestor, sql: &str) -> Option<String> {
    let rows = ingestor.database_mut().query_strings(sql, &[], 1).unwrap();
    rows.into_iter().next().and_then(|r| r.into_iter().next().flatten())
}

#[test]
fn test_schema_prefix_end_to_end() {
    let records = vec![json!({
        "id": "b096504a-3d54-4664-9bf5-1b872466fd66",
        "value": "value",
        "subObjects": [
            {"id": "2b94c631-fca9-4892-a730-03ee529ffe2a", "value": "sub-value-1"},
            {"id": "8516a913-8bf7-55a4-ab71-417aba9171c9", "value": "sub-value-2"}
        ]
    })];
    let mut ingestor = ingestor(FakeCollection::new("purchaseOrders", records));
    let outcome = ingestor
        .ingest(&IngestRequest::new("folio.po", "/orders").max_depth(2))
        .unwrap();
    assert_eq!(
        outcome.tables,
        vec!["folio.po", "folio.po__t", "folio.po__t__sub_objects", "folio.po__tcatalog"]
    );
    assert_eq!(
        tables_in(&mut ingestor, "folio"),
        vec!["po", "po__t", "po__t__sub_objects", "po__tcatalog"]
    );
    assert_eq!(
        scalar(
            &mut ingestor,
            "SELECT string_agg(sub_objects__value, ',' ORDER BY sub_objects__o) FROM folio.po__t__sub_objects"
        )
        .as_deref(),
        Some("sub-value-1,sub-value-2")
    );
    assert_eq!(
        scalar(&mut ingestor, "SELECT typeof(id) FROM folio.po__t").as_deref(),
        Some("VARCHAR")
    );
}

#[test]
fn test_rerun_and_history() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(25)));
    let request = IngestRequest::new("folio.users", "/users");
    ingestor.ingest(&request).unwrap();
    let outcome = ingestor.ingest(&request).unwrap();
    assert_eq!(outcome.ingested, 25);
    assert_eq!(
        scalar(&mut ingestor, "SELECT count(*)::VARCHAR FROM folio.users__t").as_deref(),
        Some("25")
    );

    let entry = read_load(ingestor.database_mut(), "folio.users").unwrap().unwrap();
    assert_eq!(entry.row_count, 25);
    assert_eq!(
        tables_in(&mut ingestor, "recordloom_system"),
        vec!["load_history"]
    );
}

#[test]
fn test_drop_schema_prefix() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(3)));
    ingestor
        .ingest(&IngestRequest::new("folio.users", "/users"))
        .unwrap();
    ingestor.drop_prefix("folio.users").unwrap();
    assert!(tables_in(&mut ingestor, "folio").is_empty());
    assert_eq!(read_load(ingestor.database_mut(), "folio.users").unwrap(), None);
}

#[test]
fn test_schema_prefix_catalog_round_trip_with_punctuated_keys() {
    let records = vec![
        json!({"id": "a", "v.x": [{"c": 1}], "o'k": [{"d": 2}]}),
        json!({"id": "b", "v.x": [{"c": 3}], "o'k": [{"d": 4}]}),
    ];
    let mut ingestor = ingestor(FakeCollection::new("items", records));
    let request = IngestRequest::new("folio.p", "/items").max_depth(2);
    ingestor.ingest(&request).unwrap();

    let expected = vec!["p", "p__t", "p__t__o'k", "p__t__v.x", "p__tcatalog"];
    assert_eq!(tables_in(&mut ingestor, "folio"), expected);
    let catalog = ingestor
        .database_mut()
        .query_strings(
            r#"SELECT table_name FROM "folio"."p__tcatalog" ORDER BY table_name"#,
            &[],
            1,
        )
        .unwrap();
    assert_eq!(
        catalog,
        vec![
            vec![Some("folio.p__t".to_string())],
            vec![Some("folio.p__t__o'k".to_string())],
            vec![Some("folio.p__t__v.x".to_string())],
        ]
    );

    ingestor.ingest(&request).unwrap();
    assert_eq!(tables_in(&mut ingestor, "folio"), expected);
    assert_eq!(
        scalar(&mut ingestor, r#"SELECT count(*)::VARCHAR FROM "folio"."p__t__v.x""#).as_deref(),
        Some("2")
    );

    ingestor.drop_prefix("folio.p").unwrap();
    assert!(tables_in(&mut ingestor, "folio").is_empty());
    assert_eq!(
        tables_in(&mut ingestor, "recordloom_system"),
        vec!["load_history"]
    );
}
