#[path = "../common/mod.rs"]
mod common;

use common::{users, FakeCollection};
use recordloom::db::{Database, SqliteDatabase};
use recordloom::fetch::QueryFilter;
use recordloom::ingest::history::read_load;
use recordloom::ingest::{Flow, IngestError, IngestOptions, IngestRequest, Ingestor};
use serde_json::{json, Value};

fn ingestor(fake: FakeCollection) -> Ingestor {
    let db = SqliteDatabase::open_in_memory().unwrap();
    let options = IngestOptions {
        page_size: 2,
        retries: 0,
        create_indexes: true,
        scan_batch_size: 3,
    };
    Ingestor::new(Box::new(db), Box::new(fake), options)
}

fn scalar(ingestor: &mut Ingestor, sql: &str) -> Option<String> {
    let rows = ingestor.database_mut().query_strings(sql, &[], 1).unwrap();
    rows.into_iter().next().and_then(|r| r.into_iter().next().flatten())
}

fn table_names(ingestor: &mut Ingestor) -> Vec<String> {
    ingestor
        .database_mut()
        .query_strings(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            &[],
            1,
        )
        .unwrap()
        .into_iter()
        .filter_map(|r| r.into_iter().next().flatten())
        .collect()
}

fn purchase_orders() -> Vec<Value> {
    vec![json!({
        "id": "b096504a-3d54-4664-9bf5-1b872466fd66",
        "value": "value",
        "subObjects": [
            {"id": "2b94c631-fca9-4892-a730-03ee529ffe2a", "value": "sub-value-1"},
            {"id": "8516a913-8bf7-55a4-ab71-417aba9171c9", "value": "sub-value-2"}
        ]
    })]
}

#[test]
fn test_depth_one_tables() {
    let mut ingestor = ingestor(FakeCollection::new("purchaseOrders", purchase_orders()));
    let outcome = ingestor
        .ingest(&IngestRequest::new("prefix", "/orders").max_depth(1))
        .unwrap();
    assert_eq!(outcome.tables, vec!["prefix", "prefix__t", "prefix__tcatalog"]);
    assert_eq!(outcome.total, Some(1));
    assert_eq!(outcome.ingested, 1);
    assert_eq!(
        scalar(&mut ingestor, "SELECT value FROM prefix__t").as_deref(),
        Some("value")
    );
}

#[test]
fn test_depth_two_adds_child_table() {
    let mut ingestor = ingestor(FakeCollection::new("purchaseOrders", purchase_orders()));
    let outcome = ingestor
        .ingest(&IngestRequest::new("prefix", "/orders").max_depth(2))
        .unwrap();
    assert_eq!(
        outcome.tables,
        vec!["prefix", "prefix__t", "prefix__t__sub_objects", "prefix__tcatalog"]
    );
    assert_eq!(
        scalar(&mut ingestor, "SELECT CAST(count(*) AS TEXT) FROM prefix__t__sub_objects").as_deref(),
        Some("2")
    );
    assert_eq!(
        scalar(
            &mut ingestor,
            "SELECT CAST(count(*) AS TEXT) FROM prefix__tcatalog"
        )
        .as_deref(),
        Some("2")
    );
}

#[test]
fn test_depth_zero_keeps_only_raw() {
    let mut ingestor = ingestor(FakeCollection::new("purchaseOrders", purchase_orders()));
    let outcome = ingestor
        .ingest(&IngestRequest::new("prefix", "/orders").max_depth(0))
        .unwrap();
    assert_eq!(outcome.tables, vec!["prefix"]);
    assert_eq!(
        table_names(&mut ingestor),
        vec!["prefix", "recordloom_system__load_history"]
    );
}

#[test]
fn test_raw_rows_keep_record_order() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(5)));
    let outcome = ingestor
        .ingest(&IngestRequest::new("users", "/users").max_depth(1))
        .unwrap();
    assert_eq!(outcome.ingested, 5);
    let rows = ingestor
        .database_mut()
        .query_strings(r#"SELECT CAST("__id" AS TEXT), "jsonb" FROM "users" ORDER BY "__id""#, &[], 2)
        .unwrap();
    assert_eq!(rows.len(), 5);
    for (n, row) in rows.iter().enumerate() {
        let doc: Value = serde_json::from_str(row[1].as_deref().unwrap()).unwrap();
        assert_eq!(row[0].as_deref(), Some((n + 1).to_string().as_str()));
        assert_eq!(doc["username"], format!("user{}", n + 1));
    }
}

#[test]
fn test_null_records_are_skipped() {
    let records = vec![
        json!({"code": "a"}),
        Value::Null,
        json!({"code": "b"}),
    ];
    let mut ingestor = ingestor(FakeCollection::new("codes", records));
    let outcome = ingestor
        .ingest(&IngestRequest::new("codes", "/codes").max_depth(1))
        .unwrap();
    assert_eq!(outcome.ingested, 2);
    assert_eq!(
        scalar(&mut ingestor, "SELECT group_concat(code, ',') FROM codes__t").as_deref(),
        Some("a,b")
    );
}

#[test]
fn test_ingest_twice_is_idempotent() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(4)));
    let request = IngestRequest::new("users", "/users");
    let first = ingestor.ingest(&request).unwrap();
    let before = scalar(&mut ingestor, "SELECT group_concat(username, ',') FROM users__t");
    let second = ingestor.ingest(&request).unwrap();
    let after = scalar(&mut ingestor, "SELECT group_concat(username, ',') FROM users__t");
    assert_eq!(first, second);
    assert_eq!(before, after);
    assert_eq!(
        scalar(&mut ingestor, "SELECT CAST(count(*) AS TEXT) FROM users__t").as_deref(),
        Some("4")
    );
}

#[test]
fn test_row_limit_stops_early() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(10)));
    let outcome = ingestor
        .ingest(&IngestRequest::new("users", "/users").row_limit(3))
        .unwrap();
    assert_eq!(outcome.ingested, 3);
    assert_eq!(outcome.total, Some(10));
    assert_eq!(
        scalar(&mut ingestor, "SELECT CAST(count(*) AS TEXT) FROM users__t").as_deref(),
        Some("3")
    );
}

#[test]
fn test_progress_callback_can_stop() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(10)));
    let mut seen = Vec::new();
    let outcome = ingestor
        .ingest_with_progress(&IngestRequest::new("users", "/users"), |p| {
            seen.push(p.pkey);
            if p.ingested == 4 {
                Flow::Stop
            } else {
                Flow::Continue
            }
        })
        .unwrap();
    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert_eq!(outcome.ingested, 4);
    assert!(!ingestor.database_mut().in_transaction());
}

#[test]
fn test_drop_raw() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(2)));
    let outcome = ingestor
        .ingest(&IngestRequest::new("users", "/users").keep_raw(false))
        .unwrap();
    assert_eq!(outcome.tables, vec!["users__t", "users__tcatalog"]);
    assert!(!table_names(&mut ingestor).contains(&"users".to_string()));
}

#[test]
fn test_failed_run_leaves_previous_tables() {
    let mut good = ingestor(FakeCollection::new("users", users(3)));
    good.ingest(&IngestRequest::new("users", "/users")).unwrap();
    let before = table_names(&mut good);

    let failing = FakeCollection::new("users", users(5)).failing_pages(500);
    let mut bad = Ingestor::new(good.into_database(), Box::new(failing), IngestOptions::default());
    let err = bad.ingest(&IngestRequest::new("users", "/users")).unwrap_err();
    assert!(matches!(err, IngestError::Fetch(_)));

    assert_eq!(table_names(&mut bad), before);
    assert_eq!(
        scalar(&mut bad, "SELECT CAST(count(*) AS TEXT) FROM users__t").as_deref(),
        Some("3")
    );
    let entry = read_load(bad.database_mut(), "users").unwrap().unwrap();
    assert_eq!(entry.row_count, 3);
}

#[test]
fn test_history_records_latest_run() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(3)));
    let request = IngestRequest::new("users", "/users")
        .filter(QueryFilter::Cql("active==true".into()));
    ingestor.ingest(&request).unwrap();

    let entry = read_load(ingestor.database_mut(), "users").unwrap().unwrap();
    assert_eq!(entry.table_name, "users");
    assert_eq!(entry.query, "active==true");
    assert_eq!(entry.row_count, 3);
    assert!(entry.download_complete_utc.is_some());
    assert!(entry.transformation_complete_utc.is_some());
    assert!(entry.index_complete_utc.is_some());
}

#[test]
fn test_indexes_are_created_on_join_columns() {
    let mut ingestor = ingestor(FakeCollection::new("purchaseOrders", purchase_orders()));
    ingestor
        .ingest(&IngestRequest::new("prefix", "/orders").max_depth(2))
        .unwrap();
    assert_eq!(
        scalar(
            &mut ingestor,
            "SELECT CAST(count(*) AS TEXT) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'prefix__t__sub_objects'"
        )
        .as_deref(),
        Some("3")
    );
}

#[test]
fn test_schema_prefix_rejected_on_sqlite() {
    let mut ingestor = ingestor(FakeCollection::new("users", users(1)));
    let err = ingestor
        .ingest(&IngestRequest::new("folio.users", "/users"))
        .unwrap_err();
    assert!(matches!(err, IngestError::Prefix(_)));
}

#[test]
fn test_invalid_depth_is_rejected_before_io() {
    let fake = FakeCollection::new("users", users(1));
    let log = fake.log();
    let mut ingestor = ingestor(fake);
    let err = ingestor
        .ingest(&IngestRequest::new("users", "/users").max_depth(9))
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidConfig(_)));
    assert!(log.lock().unwrap().is_empty());
}
