//! Paged reading of a remote collection.
//!
//! A [`Paginator`] first asks for the collection's total, then picks one
//! paging mode for the whole run:
//!
//! - stream: `/source-storage` paths are read through the bulk stream
//!   endpoint in a single request;
//! - keyset: pages of `id > last`, in id order, starting from the nil UUID;
//! - offset: numbered pages, used when items have no `id`, when the filter
//!   already sorts, or when the caller names a field to page by.
//!
//! Records are numbered from 1 in arrival order. `null` items are skipped
//! without using a number. A page with no non-null items ends the run.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{FetchError, FetchResult};
use super::query::{self, QueryFilter};
use super::stream::StreamRecords;
use super::transport::{QueryParams, Response, Transport};
use super::Record;

/// Path prefix of collections read through the stream endpoint.
pub const STREAM_PREFIX: &str = "/source-storage";
/// Count endpoint for streamed collections.
pub const STREAM_STATS_PATH: &str = "/source-storage/source-records";
/// Bulk endpoint for streamed collections.
pub const STREAM_PATH: &str = "/source-storage/stream/source-records";

/// Which collection to read and how to narrow it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordQuery {
    pub path: String,
    pub filter: QueryFilter,
    /// Field to sort offset pages by. Forces offset mode.
    pub page_by: Option<String>,
}

impl RecordQuery {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn page_by(mut self, field: impl Into<String>) -> Self {
        self.page_by = Some(field.into());
        self
    }

    fn is_streamed(&self) -> bool {
        self.path.starts_with(STREAM_PREFIX)
    }
}

/// Paging mode chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagingMode {
    /// The remote reported no records.
    Empty,
    Stream,
    Keyset,
    Offset { sort_by: Option<String> },
}

/// Reads collections through a [`Transport`].
#[derive(Clone, Copy)]
pub struct Paginator<'t> {
    transport: &'t dyn Transport,
    page_size: u32,
    retries: u32,
}

impl<'t> Paginator<'t> {
    pub fn new(transport: &'t dyn Transport, page_size: u32, retries: u32) -> Self {
        Self {
            transport,
            page_size: page_size.max(1),
            retries,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch the total and choose a paging mode. Records are fetched
    /// lazily as the returned stream is iterated.
    pub fn records(&self, request: &RecordQuery) -> FetchResult<RecordStream<'t>> {
        let stats_path = if request.is_streamed() {
            STREAM_STATS_PATH
        } else {
            request.path.as_str()
        };
        let stats = self.get_json(stats_path, &query::stats_params(&request.filter))?;
        let total = total_records(&stats);
        match total {
            Some(n) => info!(path = %request.path, total = n, "collection size"),
            None => warn!(path = %request.path, "response has no usable totalRecords"),
        }

        let source = if total == Some(0) {
            Source::Empty
        } else if request.is_streamed() {
            Source::PendingStream
        } else {
            let (key, first) = records_array(&stats).ok_or_else(|| {
                FetchError::malformed(stats_path, "no array of records", &stats.to_string())
            })?;
            let cursor = match choose_mode(request, first.first()) {
                PagingMode::Offset { sort_by } => PageCursor::Offset { sort_by, page: 0 },
                _ => PageCursor::Keyset {
                    last_id: Uuid::nil().to_string(),
                },
            };
            Source::Pages {
                key: key.to_string(),
                cursor,
                buffer: VecDeque::new(),
            }
        };
        let stream = RecordStream {
            paginator: *self,
            path: request.path.clone(),
            filter: request.filter.clone(),
            total,
            next_pkey: 1,
            source,
        };
        info!(path = %request.path, mode = ?stream.mode(), "paging mode");
        Ok(stream)
    }

    /// GET with retries on timeout, then require a 2xx JSON object.
    fn get_json(&self, path: &str, params: &QueryParams) -> FetchResult<Value> {
        let response = self.get_with_retry(path, params)?;
        if !response.is_success() {
            return Err(FetchError::status(path, response.status, &response.body));
        }
        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| FetchError::malformed(path, e.to_string(), &response.body))?;
        if !value.is_object() {
            return Err(FetchError::malformed(path, "expected a JSON object", &response.body));
        }
        Ok(value)
    }

    fn get_with_retry(&self, path: &str, params: &QueryParams) -> FetchResult<Response> {
        let attempts = self.retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.get(path, params) {
                Err(e) if e.is_retriable() && attempt < attempts => {
                    warn!(path, attempt, attempts, "request timed out, retrying");
                }
                Err(FetchError::Timeout { path, .. }) => {
                    return Err(FetchError::Timeout {
                        path,
                        attempts: attempt,
                    })
                }
                other => return other,
            }
        }
    }
}

fn total_records(stats: &Value) -> Option<u64> {
    match stats.get("totalRecords")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The first array-valued member of a response object.
fn records_array(body: &Value) -> Option<(&str, &Vec<Value>)> {
    body.as_object()?
        .iter()
        .find_map(|(k, v)| v.as_array().map(|items| (k.as_str(), items)))
}

/// Keyset unless something rules it out. Never returns `Empty` or `Stream`.
fn choose_mode(request: &RecordQuery, first: Option<&Value>) -> PagingMode {
    if let Some(field) = &request.page_by {
        return PagingMode::Offset {
            sort_by: Some(field.clone()),
        };
    }
    if let Some(Value::Object(item)) = first {
        if !item.contains_key("id") {
            return PagingMode::Offset {
                sort_by: item.keys().next().cloned(),
            };
        }
    }
    if request.filter.imposes_order() {
        return PagingMode::Offset { sort_by: None };
    }
    PagingMode::Keyset
}

enum PageCursor {
    Keyset { last_id: String },
    Offset { sort_by: Option<String>, page: u64 },
}

enum Source {
    Empty,
    PendingStream,
    Stream(StreamRecords),
    Pages {
        key: String,
        cursor: PageCursor,
        buffer: VecDeque<Value>,
    },
    Done,
}

/// Lazy sequence of the records of one collection.
pub struct RecordStream<'t> {
    paginator: Paginator<'t>,
    path: String,
    filter: QueryFilter,
    total: Option<u64>,
    next_pkey: i64,
    source: Source,
}

impl RecordStream<'_> {
    /// Total reported by the remote before paging began.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn mode(&self) -> PagingMode {
        match &self.source {
            Source::Empty => PagingMode::Empty,
            Source::PendingStream | Source::Stream(_) => PagingMode::Stream,
            Source::Pages { cursor, .. } => match cursor {
                PageCursor::Keyset { .. } => PagingMode::Keyset,
                PageCursor::Offset { sort_by, .. } => PagingMode::Offset {
                    sort_by: sort_by.clone(),
                },
            },
            Source::Done => PagingMode::Empty,
        }
    }

    fn record(&mut self, json: Vec<u8>) -> Record {
        let pkey = self.next_pkey;
        self.next_pkey += 1;
        Record { pkey, json }
    }

    fn next_streamed(&mut self) -> Option<FetchResult<Record>> {
        if let Source::PendingStream = self.source {
            let params = query::stream_params(&self.filter);
            match self.paginator.transport.stream(STREAM_PATH, &params) {
                Ok(reader) => self.source = Source::Stream(StreamRecords::new(STREAM_PATH, reader)),
                Err(e) => {
                    self.source = Source::Done;
                    return Some(Err(e));
                }
            }
        }
        let Source::Stream(records) = &mut self.source else {
            return None;
        };
        match records.next()? {
            Ok(bytes) => {
                if let Err(e) = std::str::from_utf8(&bytes) {
                    let lossy = String::from_utf8_lossy(&bytes).into_owned();
                    self.source = Source::Done;
                    return Some(Err(FetchError::malformed(STREAM_PATH, e.to_string(), &lossy)));
                }
                Some(Ok(self.record(bytes)))
            }
            Err(e) => {
                self.source = Source::Done;
                Some(Err(e))
            }
        }
    }

    /// Fetch the next page into the buffer. Returns false when the
    /// collection is exhausted.
    fn fill(&mut self) -> FetchResult<bool> {
        let page_size = self.paginator.page_size;
        let Source::Pages { key, cursor, buffer } = &mut self.source else {
            return Ok(false);
        };
        let params = match cursor {
            PageCursor::Keyset { last_id } => query::keyset_params(&self.filter, last_id, page_size),
            PageCursor::Offset { sort_by, page } => {
                query::offset_params(&self.filter, sort_by.as_deref(), *page, page_size)
            }
        };
        let body = self.paginator.get_json(&self.path, &params)?;
        let items = match body.get(key.as_str()) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FetchError::malformed(
                    &self.path,
                    format!("page has no \"{}\" array", key),
                    &body.to_string(),
                ))
            }
        };
        let records: Vec<Value> = items.iter().filter(|v| !v.is_null()).cloned().collect();
        debug!(path = %self.path, records = records.len(), "page fetched");
        let Some(last) = records.last() else {
            return Ok(false);
        };

        match cursor {
            PageCursor::Keyset { last_id } => {
                *last_id = match last.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    Some(id @ Value::Number(_)) => id.to_string(),
                    _ => {
                        return Err(FetchError::malformed(
                            &self.path,
                            "record without an id in keyset paging",
                            &last.to_string(),
                        ))
                    }
                };
            }
            PageCursor::Offset { page, .. } => *page += 1,
        }
        buffer.extend(records);
        Ok(true)
    }

    fn next_paged(&mut self) -> Option<FetchResult<Record>> {
        loop {
            if let Source::Pages { buffer, .. } = &mut self.source {
                if let Some(item) = buffer.pop_front() {
                    return Some(match serde_json::to_vec(&item) {
                        Ok(json) => Ok(self.record(json)),
                        Err(e) => Err(FetchError::malformed(&self.path, e.to_string(), "")),
                    });
                }
            } else {
                return None;
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => {
                    self.source = Source::Done;
                    return None;
                }
                Err(e) => {
                    self.source = Source::Done;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Iterator for RecordStream<'_> {
    type Item = FetchResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.source {
            Source::Empty | Source::Done => None,
            Source::PendingStream | Source::Stream(_) => self.next_streamed(),
            Source::Pages { .. } => self.next_paged(),
        }
    }
}
