//! Expansion of raw documents into derived tables on in-memory SQLite.

use recordloom::db::{Database, Prefix, SqliteDatabase};
use recordloom::fetch::Record;
use recordloom::ingest::raw::{prepare_raw_table, RawLoader};
use recordloom::transform::{infer, materialize, TransformOptions};
use serde_json::{json, Value};

const PARENT_ID: &str = "b096504a-3d54-4664-9bf5-1b872466fd66";

fn options(max_depth: u32) -> TransformOptions {
    TransformOptions {
        max_depth,
        native_uuid: false,
        batch_size: 2,
    }
}

/// Load `docs` into the raw table `p` and run both passes.
fn expand(docs: &[Value], max_depth: u32) -> (SqliteDatabase, Vec<String>) {
    let mut db = SqliteDatabase::open_in_memory().unwrap();
    let prefix = Prefix::parse("p").unwrap();
    prepare_raw_table(&mut db, &prefix).unwrap();
    let mut loader = RawLoader::new(&db, &prefix);
    for (i, doc) in docs.iter().enumerate() {
        let record = Record {
            pkey: i as i64 + 1,
            json: doc.to_string().into_bytes(),
        };
        loader.push(&mut db, record).unwrap();
    }
    loader.finish(&mut db).unwrap();

    let opts = options(max_depth);
    let root = prefix.root_table_name();
    let catalog = infer::scan(&mut db, prefix.raw_table(), &root, &opts).unwrap();
    infer::create_tables(&mut db, None, &catalog).unwrap();
    materialize::materialize(&mut db, prefix.raw_table(), &root, &catalog, &opts).unwrap();
    let names = catalog.table_names().map(str::to_string).collect();
    (db, names)
}

fn columns(db: &mut SqliteDatabase, table: &str) -> Vec<String> {
    let sql = format!("SELECT name FROM pragma_table_info('{}') ORDER BY cid", table);
    db.query_strings(&sql, &[], 1)
        .unwrap()
        .into_iter()
        .filter_map(|r| r.into_iter().next().flatten())
        .collect()
}

fn rows(db: &mut SqliteDatabase, sql: &str, width: usize) -> Vec<Vec<Option<String>>> {
    db.query_strings(sql, &[], width).unwrap()
}

fn purchase_order() -> Value {
    json!({"id": PARENT_ID, "value": "value"})
}

#[test]
fn test_flat_record_at_depth_one() {
    let (mut db, tables) = expand(&[purchase_order()], 1);
    assert_eq!(tables, vec!["p__t"]);
    assert_eq!(columns(&mut db, "p__t"), vec!["__id", "id", "value"]);
    assert_eq!(
        rows(&mut db, "SELECT id, value FROM p__t", 2),
        vec![vec![Some(PARENT_ID.to_string()), Some("value".to_string())]]
    );
}

#[test]
fn test_nested_array_becomes_child_table() {
    let mut doc = purchase_order();
    doc["subObjects"] = json!([
        {"id": "2b94c631-fca9-4892-a730-03ee529ffe2a", "value": "sub-value-1"},
        {"id": "8516a913-8bf7-55a4-ab71-417aba9171c9", "value": "sub-value-2"}
    ]);
    let (mut db, tables) = expand(&[doc], 2);
    assert_eq!(tables, vec!["p__t", "p__t__sub_objects"]);
    assert_eq!(
        columns(&mut db, "p__t__sub_objects"),
        vec!["__id", "id", "value", "sub_objects__o", "sub_objects__id", "sub_objects__value"]
    );

    let got = rows(
        &mut db,
        "SELECT id, CAST(sub_objects__o AS TEXT), sub_objects__value FROM p__t__sub_objects ORDER BY sub_objects__o",
        3,
    );
    assert_eq!(
        got,
        vec![
            vec![Some(PARENT_ID.into()), Some("1".into()), Some("sub-value-1".into())],
            vec![Some(PARENT_ID.into()), Some("2".into()), Some("sub-value-2".into())],
        ]
    );
}

#[test]
fn test_depth_zero_creates_nothing() {
    let (_, tables) = expand(&[purchase_order()], 0);
    assert!(tables.is_empty());
}

#[test]
fn test_ordinals_are_positions_per_parent() {
    let docs = vec![
        json!({"id": "a", "tags": ["x", "y", "z"]}),
        json!({"id": "b", "tags": ["q"]}),
    ];
    let (mut db, _) = expand(&docs, 2);
    let got = rows(
        &mut db,
        "SELECT id, CAST(tags__o AS TEXT), tags FROM p__t__tags ORDER BY id, tags__o",
        3,
    );
    let flat: Vec<Vec<&str>> = got
        .iter()
        .map(|r| r.iter().map(|c| c.as_deref().unwrap_or("")).collect())
        .collect();
    assert_eq!(
        flat,
        vec![
            vec!["a", "1", "x"],
            vec!["a", "2", "y"],
            vec!["a", "3", "z"],
            vec!["b", "1", "q"],
        ]
    );
}

#[test]
fn test_child_rows_join_back_to_parents() {
    let docs: Vec<Value> = (1..=5)
        .map(|n| {
            json!({
                "id": format!("doc{}", n),
                "name": format!("name{}", n),
                "items": (0..n).map(|i| json!({"sku": format!("s{}", i)})).collect::<Vec<_>>()
            })
        })
        .collect();
    let (mut db, _) = expand(&docs, 2);

    let orphans = rows(
        &mut db,
        "SELECT CAST(count(*) AS TEXT) FROM p__t__items c \
         LEFT JOIN p__t t ON t.id = c.id AND t.name = c.name WHERE t.id IS NULL",
        1,
    );
    assert_eq!(orphans[0][0].as_deref(), Some("0"));

    let per_parent = rows(
        &mut db,
        "SELECT id, CAST(count(*) AS TEXT), CAST(max(items__o) AS TEXT) FROM p__t__items GROUP BY id ORDER BY id",
        3,
    );
    for (n, row) in per_parent.iter().enumerate() {
        let expected = (n + 1).to_string();
        assert_eq!(row[1].as_deref(), Some(expected.as_str()));
        assert_eq!(row[2].as_deref(), Some(expected.as_str()));
    }
}

#[test]
fn test_degraded_object_round_trips() {
    let nested = json!({"level2": {"level3": [1, {"x": null}], "flag": true}});
    let doc = json!({"id": "a", "meta": nested});
    let (mut db, tables) = expand(&[doc], 1);
    assert_eq!(tables, vec!["p__t"]);

    let got = rows(&mut db, "SELECT meta FROM p__t", 1);
    let stored: Value = serde_json::from_str(got[0][0].as_deref().unwrap()).unwrap();
    assert_eq!(stored, nested);
}

#[test]
fn test_nested_objects_flatten_into_parent() {
    let doc = json!({"id": "a", "metadata": {"createdDate": "2024-01-01", "updatedByUserId": "u"}});
    let (mut db, tables) = expand(&[doc], 2);
    assert_eq!(tables, vec!["p__t"]);
    assert_eq!(
        columns(&mut db, "p__t"),
        vec!["__id", "id", "metadata__created_date", "metadata__updated_by_user_id"]
    );
}

#[test]
fn test_null_array_elements_keep_positions() {
    let doc = json!({"id": "a", "items": [{"n": 1}, null, {"n": 3}]});
    let (mut db, _) = expand(&[doc], 2);
    let got = rows(
        &mut db,
        "SELECT CAST(items__o AS TEXT), CAST(items__n AS TEXT) FROM p__t__items ORDER BY items__o",
        2,
    );
    assert_eq!(
        got,
        vec![
            vec![Some("1".into()), Some("1".into())],
            vec![Some("3".into()), Some("3".into())],
        ]
    );
}

#[test]
fn test_first_shape_wins_across_documents() {
    let docs = vec![json!({"code": 7}), json!({"code": "seven"}), json!({"code": 8.5})];
    let (mut db, _) = expand(&docs, 1);
    let got = rows(&mut db, "SELECT CAST(code AS TEXT) FROM p__t ORDER BY __id", 1);
    assert_eq!(
        got,
        vec![vec![Some("7".into())], vec![None], vec![Some("8.5".into())]]
    );
}

#[test]
fn test_non_object_documents_are_skipped() {
    let docs = vec![json!({"id": "a"}), json!([1, 2]), json!("text"), json!({"id": "b"})];
    let (mut db, _) = expand(&docs, 1);
    let got = rows(&mut db, "SELECT id FROM p__t ORDER BY __id", 1);
    assert_eq!(got, vec![vec![Some("a".into())], vec![Some("b".into())]]);
}

#[test]
fn test_rerun_replaces_tables() {
    let (mut db, _) = expand(&[purchase_order()], 1);
    let prefix = Prefix::parse("p").unwrap();
    let opts = options(1);
    let catalog = infer::scan(&mut db, prefix.raw_table(), "p__t", &opts).unwrap();
    infer::create_tables(&mut db, None, &catalog).unwrap();
    materialize::materialize(&mut db, prefix.raw_table(), "p__t", &catalog, &opts).unwrap();
    let got = rows(&mut db, "SELECT CAST(count(*) AS TEXT) FROM p__t", 1);
    assert_eq!(got[0][0].as_deref(), Some("1"));
    assert!(!db.in_transaction());
}
