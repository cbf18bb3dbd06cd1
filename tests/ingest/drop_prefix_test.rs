#[path = "../common/mod.rs"]
mod common;

use common::{users, FakeCollection};
use recordloom::db::SqliteDatabase;
use recordloom::ingest::history::read_load;
use recordloom::ingest::{IngestOptions, IngestRequest, Ingestor};
use serde_json::{json, Value};

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

fn loaded() -> Ingestor {
    let records = vec![
        json!({"id": "a", "tags": ["x", "y"]}),
        json!({"id": "b", "tags": ["z"]}),
    ];
    let fake = FakeCollection::new("items", records);
    let db = SqliteDatabase::open_in_memory().unwrap();
    let mut ingestor = Ingestor::new(Box::new(db), Box::new(fake), IngestOptions::default());
    ingestor
        .ingest(&IngestRequest::new("items", "/items").max_depth(2))
        .unwrap();
    ingestor
        .database_mut()
        .execute_ddl("CREATE TABLE unrelated (a TEXT)")
        .unwrap();
    ingestor
}

#[test]
fn test_drop_removes_exactly_the_prefix() {
    let mut ingestor = loaded();
    assert_eq!(
        table_names(&mut ingestor),
        vec![
            "items",
            "items__t",
            "items__t__tags",
            "items__tcatalog",
            "recordloom_system__load_history",
            "unrelated",
        ]
    );

    ingestor.drop_prefix("items").unwrap();
    assert_eq!(
        table_names(&mut ingestor),
        vec!["recordloom_system__load_history", "unrelated"]
    );
    assert_eq!(read_load(ingestor.database_mut(), "items").unwrap(), None);
}

#[test]
fn test_drop_unknown_prefix_is_a_noop() {
    let mut ingestor = loaded();
    let before = table_names(&mut ingestor);
    ingestor.drop_prefix("missing").unwrap();
    assert_eq!(table_names(&mut ingestor), before);
    assert!(read_load(ingestor.database_mut(), "items").unwrap().is_some());
}

#[test]
fn test_drop_on_empty_database() {
    let db = SqliteDatabase::open_in_memory().unwrap();
    let fake = FakeCollection::new("users", users(1));
    let mut ingestor = Ingestor::new(Box::new(db), Box::new(fake), IngestOptions::default());
    ingestor.drop_prefix("users").unwrap();
    assert!(table_names(&mut ingestor).is_empty());
}

#[test]
fn test_drop_prefix_does_not_touch_similar_names() {
    let mut ingestor = loaded();
    ingestor
        .database_mut()
        .execute_ddl("CREATE TABLE items2__t (a TEXT)")
        .unwrap();
    ingestor.drop_prefix("items").unwrap();
    assert!(table_names(&mut ingestor).contains(&"items2__t".to_string()));
}

fn keyed_with_punctuation() -> Vec<Value> {
    vec![
        json!({"id": "a", "v.x": [{"c": 1}], "o'k": [{"d": 2}]}),
        json!({"id": "b", "v.x": [{"c": 3}, {"c": 4}], "o'k": []}),
    ]
}

#[test]
fn test_drop_tables_named_after_punctuated_keys() {
    let db = SqliteDatabase::open_in_memory().unwrap();
    let fake = FakeCollection::new("items", keyed_with_punctuation());
    let mut ingestor = Ingestor::new(Box::new(db), Box::new(fake), IngestOptions::default());
    let request = IngestRequest::new("p", "/items").max_depth(2);
    ingestor.ingest(&request).unwrap();

    let expected = vec![
        "p",
        "p__t",
        "p__t__o'k",
        "p__t__v.x",
        "p__tcatalog",
        "recordloom_system__load_history",
    ];
    assert_eq!(table_names(&mut ingestor), expected);
    let catalog = ingestor
        .database_mut()
        .query_strings(
            r#"SELECT table_name FROM "p__tcatalog" ORDER BY table_name"#,
            &[],
            1,
        )
        .unwrap();
    assert_eq!(
        catalog,
        vec![
            vec![Some("p__t".to_string())],
            vec![Some("p__t__o'k".to_string())],
            vec![Some("p__t__v.x".to_string())],
        ]
    );

    // A rerun replaces the derived tables through the catalog.
    ingestor.ingest(&request).unwrap();
    assert_eq!(table_names(&mut ingestor), expected);

    ingestor.drop_prefix("p").unwrap();
    assert_eq!(
        table_names(&mut ingestor),
        vec!["recordloom_system__load_history"]
    );
}
