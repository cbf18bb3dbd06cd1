#[path = "../common/mod.rs"]
mod common;

use common::{timeout, uuid, users, FakeCollection, Scripted};
use recordloom::fetch::{FetchError, Paginator, PagingMode, QueryFilter, RecordQuery, Response};
use serde_json::{json, Value};

fn texts(paginator: &Paginator<'_>, query: &RecordQuery) -> Vec<(i64, Value)> {
    paginator
        .records(query)
        .unwrap()
        .map(|r| {
            let r = r.unwrap();
            (r.pkey, serde_json::from_slice(&r.json).unwrap())
        })
        .collect()
}

#[test]
fn test_keyset_paging_reads_every_record_in_id_order() {
    let fake = FakeCollection::new("users", users(7));
    let log = fake.log();
    let paginator = Paginator::new(&fake, 3, 0);

    let stream = paginator.records(&RecordQuery::new("/users")).unwrap();
    assert_eq!(stream.total(), Some(7));
    assert_eq!(stream.mode(), PagingMode::Keyset);

    let records: Vec<_> = stream.map(Result::unwrap).collect();
    assert_eq!(records.len(), 7);
    assert_eq!(
        records.iter().map(|r| r.pkey).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6, 7]
    );
    let first: Value = serde_json::from_slice(&records[0].json).unwrap();
    assert_eq!(first["id"], uuid(1));

    // stats, three full or partial pages, then the empty page
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 5);
    assert_eq!(log[0].param("limit"), Some("1"));
    assert_eq!(
        log[1].param("filters"),
        Some("id>00000000-0000-0000-0000-000000000000")
    );
    assert_eq!(log[2].param("filters"), Some(format!("id>{}", uuid(3)).as_str()));
    assert_eq!(log[4].param("filters"), Some(format!("id>{}", uuid(7)).as_str()));
}

#[test]
fn test_offset_paging_when_items_have_no_id() {
    let records: Vec<Value> = (1..=5).map(|n| json!({"code": format!("c{}", n), "n": n})).collect();
    let fake = FakeCollection::new("codes", records);
    let log = fake.log();
    let paginator = Paginator::new(&fake, 2, 0);

    let query = RecordQuery::new("/codes");
    let stream = paginator.records(&query).unwrap();
    assert_eq!(
        stream.mode(),
        PagingMode::Offset {
            sort_by: Some("code".into())
        }
    );
    let got = texts(&paginator, &query);
    assert_eq!(got.len(), 5);
    assert_eq!(got[4].1["n"], 5);

    let log = log.lock().unwrap();
    let offsets: Vec<_> = log
        .iter()
        .filter_map(|s| s.param("offset").map(str::to_string))
        .collect();
    // two runs: the dropped stream never fetched a page
    assert_eq!(offsets, vec!["0", "2", "4", "6"]);
    assert!(log
        .iter()
        .filter(|s| s.param("offset").is_some())
        .all(|s| s.param("query") == Some("cql.allRecords=1 sortBy code")));
}

#[test]
fn test_sorted_filter_forces_offset_paging() {
    let fake = FakeCollection::new("users", users(3));
    let paginator = Paginator::new(&fake, 10, 0);
    let query = RecordQuery::new("/users")
        .filter(QueryFilter::Cql("active==true sortBy username".into()));
    let stream = paginator.records(&query).unwrap();
    assert_eq!(stream.mode(), PagingMode::Offset { sort_by: None });
    assert_eq!(stream.count(), 3);
}

#[test]
fn test_page_by_forces_offset_paging() {
    let fake = FakeCollection::new("users", users(3));
    let paginator = Paginator::new(&fake, 10, 0);
    let query = RecordQuery::new("/users").page_by("username");
    let stream = paginator.records(&query).unwrap();
    assert_eq!(
        stream.mode(),
        PagingMode::Offset {
            sort_by: Some("username".into())
        }
    );
}

#[test]
fn test_nulls_are_skipped_without_using_a_key() {
    let records = vec![
        json!({"code": "a"}),
        Value::Null,
        json!({"code": "b"}),
        Value::Null,
        json!({"code": "c"}),
    ];
    let fake = FakeCollection::new("codes", records);
    let paginator = Paginator::new(&fake, 10, 0);
    let got = texts(&paginator, &RecordQuery::new("/codes"));
    assert_eq!(
        got,
        vec![
            (1, json!({"code": "a"})),
            (2, json!({"code": "b"})),
            (3, json!({"code": "c"})),
        ]
    );
}

#[test]
fn test_zero_total_ends_immediately() {
    let fake = FakeCollection::new("users", Vec::new());
    let log = fake.log();
    let paginator = Paginator::new(&fake, 10, 0);
    let mut stream = paginator.records(&RecordQuery::new("/users")).unwrap();
    assert_eq!(stream.total(), Some(0));
    assert_eq!(stream.mode(), PagingMode::Empty);
    assert!(stream.next().is_none());
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_missing_total_is_not_fatal() {
    let fake = FakeCollection::new("users", users(2)).with_total(Value::Null);
    let paginator = Paginator::new(&fake, 10, 0);
    let stream = paginator.records(&RecordQuery::new("/users")).unwrap();
    assert_eq!(stream.total(), None);
    assert_eq!(stream.count(), 2);
}

#[test]
fn test_non_integer_total_is_unknown() {
    let fake = FakeCollection::new("users", users(2)).with_total(json!("lots"));
    let paginator = Paginator::new(&fake, 10, 0);
    let stream = paginator.records(&RecordQuery::new("/users")).unwrap();
    assert_eq!(stream.total(), None);
}

#[test]
fn test_stream_mode_for_source_storage() {
    let records: Vec<Value> = (1..=4)
        .map(|n| json!({"recordId": uuid(n), "parsedRecord": {"content": {"leader": "x"}}}))
        .collect();
    let fake = FakeCollection::new("sourceRecords", records);
    let log = fake.log();
    let paginator = Paginator::new(&fake, 10, 0);

    let stream = paginator
        .records(&RecordQuery::new("/source-storage/records"))
        .unwrap();
    assert_eq!(stream.mode(), PagingMode::Stream);
    let got: Vec<_> = stream.map(Result::unwrap).collect();
    assert_eq!(got.len(), 4);
    assert_eq!(got[3].pkey, 4);

    let log = log.lock().unwrap();
    assert_eq!(log[0].path, "/source-storage/source-records");
    assert_eq!(log[1].path, "/source-storage/stream/source-records");
    assert_eq!(log[1].param("limit"), Some("2147483646"));
}

#[test]
fn test_timeouts_are_retried_within_budget() {
    let stats = Response::ok(json!({"users": [{"id": uuid(1)}], "totalRecords": 1}).to_string());
    let page = Response::ok(json!({"users": [{"id": uuid(1)}]}).to_string());
    let empty = Response::ok(json!({"users": []}).to_string());
    let scripted = Scripted::new(vec![
        timeout("/users"),
        Ok(stats),
        timeout("/users"),
        timeout("/users"),
        Ok(page),
        Ok(empty),
    ]);
    let paginator = Paginator::new(&scripted, 10, 2);
    let stream = paginator.records(&RecordQuery::new("/users")).unwrap();
    let got: Vec<_> = stream.collect();
    assert_eq!(got.len(), 1);
    assert!(got[0].is_ok());
}

#[test]
fn test_timeout_budget_exhausted() {
    let scripted = Scripted::new(vec![timeout("/users"), timeout("/users"), timeout("/users")]);
    let log = scripted.log();
    let paginator = Paginator::new(&scripted, 10, 2);
    let err = paginator.records(&RecordQuery::new("/users")).err().unwrap();
    assert!(matches!(err, FetchError::Timeout { attempts: 3, .. }));
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn test_transport_errors_are_not_retried() {
    let scripted = Scripted::new(vec![Err(FetchError::Transport {
        path: "/users".into(),
        message: "connection refused".into(),
    })]);
    let log = scripted.log();
    let paginator = Paginator::new(&scripted, 10, 5);
    let err = paginator.records(&RecordQuery::new("/users")).err().unwrap();
    assert!(matches!(err, FetchError::Transport { .. }));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_non_2xx_page_aborts() {
    let fake = FakeCollection::new("users", users(3)).failing_pages(500);
    let paginator = Paginator::new(&fake, 10, 0);
    let results: Vec<_> = paginator
        .records(&RecordQuery::new("/users"))
        .unwrap()
        .collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        &results[0],
        Err(FetchError::Status { status: 500, .. })
    ));
}

#[test]
fn test_malformed_body_carries_the_body() {
    let scripted = Scripted::new(vec![Ok(Response::ok("<html>gateway</html>"))]);
    let paginator = Paginator::new(&scripted, 10, 0);
    let err = paginator.records(&RecordQuery::new("/users")).err().unwrap();
    assert!(matches!(err, FetchError::Malformed { .. }));
    assert_eq!(err.body(), Some("<html>gateway</html>"));
}

#[test]
fn test_page_missing_records_key_is_malformed() {
    let stats = Response::ok(json!({"users": [{"id": uuid(1)}], "totalRecords": 1}).to_string());
    let page = Response::ok(json!({"totalRecords": 1}).to_string());
    let scripted = Scripted::new(vec![Ok(stats), Ok(page)]);
    let paginator = Paginator::new(&scripted, 10, 0);
    let results: Vec<_> = paginator
        .records(&RecordQuery::new("/users"))
        .unwrap()
        .collect();
    assert!(matches!(results[0], Err(FetchError::Malformed { .. })));
}
