//! Scripted transports shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, Cursor};
use std::sync::{Arc, Mutex};

use recordloom::fetch::{FetchError, FetchResult, Response, Transport};
use serde_json::{json, Value};

/// One request seen by a fake transport.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Seen {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub type RequestLog = Arc<Mutex<Vec<Seen>>>;

/// An in-memory collection that answers stats, keyset, offset and stream
/// requests the way an Okapi module does.
pub struct FakeCollection {
    pub key: String,
    pub records: Vec<Value>,
    /// Overrides `totalRecords` in the stats response.
    pub total: Option<Value>,
    /// Fail every page request (not the stats request) with this status.
    pub page_status: Option<u16>,
    pub log: RequestLog,
}

impl FakeCollection {
    pub fn new(key: &str, records: Vec<Value>) -> Self {
        Self {
            key: key.to_string(),
            records,
            total: None,
            page_status: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_total(mut self, total: Value) -> Self {
        self.total = Some(total);
        self
    }

    pub fn failing_pages(mut self, status: u16) -> Self {
        self.page_status = Some(status);
        self
    }

    pub fn log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }

    fn page(&self, items: Vec<Value>) -> FetchResult<Response> {
        if let Some(status) = self.page_status {
            return Ok(Response {
                status,
                body: "page failed".into(),
            });
        }
        let mut body = serde_json::Map::new();
        body.insert(self.key.clone(), Value::Array(items));
        body.insert("totalRecords".into(), json!(self.live().count()));
        Ok(Response::ok(Value::Object(body).to_string()))
    }

    fn live(&self) -> impl Iterator<Item = &Value> {
        self.records.iter().filter(|r| !r.is_null())
    }

    fn stats(&self) -> FetchResult<Response> {
        let mut body = serde_json::Map::new();
        let first: Vec<Value> = self.live().take(1).cloned().collect();
        body.insert(self.key.clone(), Value::Array(first));
        let total = self
            .total
            .clone()
            .unwrap_or_else(|| json!(self.live().count()));
        if !total.is_null() {
            body.insert("totalRecords".into(), total);
        }
        Ok(Response::ok(Value::Object(body).to_string()))
    }
}

fn number(seen: &Seen, key: &str) -> usize {
    seen.param(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl Transport for FakeCollection {
    fn get(&self, path: &str, params: &[(String, String)]) -> FetchResult<Response> {
        let seen = Seen {
            path: path.to_string(),
            params: params.to_vec(),
        };
        self.log.lock().unwrap().push(seen.clone());

        if let Some(filter) = seen.param("filters") {
            let last = filter.trim_start_matches("id>").to_string();
            let mut items: Vec<&Value> = self
                .live()
                .filter(|r| r["id"].as_str().is_some_and(|id| id > last.as_str()))
                .collect();
            items.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
            let page = items
                .into_iter()
                .take(number(&seen, "limit"))
                .cloned()
                .collect();
            return self.page(page);
        }
        if seen.param("offset").is_some() {
            let offset = number(&seen, "offset");
            let limit = number(&seen, "limit");
            let page = self.records.iter().skip(offset).take(limit).cloned().collect();
            return self.page(page);
        }
        self.stats()
    }

    fn stream(&self, path: &str, params: &[(String, String)]) -> FetchResult<Box<dyn BufRead + Send>> {
        self.log.lock().unwrap().push(Seen {
            path: path.to_string(),
            params: params.to_vec(),
        });
        if let Some(status) = self.page_status {
            return Err(FetchError::status(path, status, "stream failed"));
        }
        let mut body = String::new();
        for record in self.live() {
            body.push_str(&record.to_string());
            body.push('\n');
        }
        Ok(Box::new(Cursor::new(body.into_bytes())))
    }
}

/// Plays back a fixed list of GET results, then fails.
pub struct Scripted {
    responses: Mutex<VecDeque<FetchResult<Response>>>,
    pub log: RequestLog,
}

impl Scripted {
    pub fn new(responses: Vec<FetchResult<Response>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }
}

impl Transport for Scripted {
    fn get(&self, path: &str, params: &[(String, String)]) -> FetchResult<Response> {
        self.log.lock().unwrap().push(Seen {
            path: path.to_string(),
            params: params.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(FetchError::Transport {
                    path: path.to_string(),
                    message: "script exhausted".into(),
                })
            })
    }

    fn stream(&self, path: &str, _params: &[(String, String)]) -> FetchResult<Box<dyn BufRead + Send>> {
        Err(FetchError::Transport {
            path: path.to_string(),
            message: "no stream scripted".into(),
        })
    }
}

pub fn timeout(path: &str) -> FetchResult<Response> {
    Err(FetchError::Timeout {
        path: path.to_string(),
        attempts: 1,
    })
}

/// A UUID whose text sorts by `n`.
pub fn uuid(n: u32) -> String {
    format!("00000000-0000-0000-0000-{:012}", n)
}

/// `count` simple user records with ascending ids.
pub fn users(count: u32) -> Vec<Value> {
    (1..=count)
        .map(|n| json!({"id": uuid(n), "username": format!("user{}", n), "active": n % 2 == 0}))
        .collect()
}
