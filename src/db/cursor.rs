//! Batched reads over a raw table.
//!
//! The cursor holds only its position; every fetch borrows the connection,
//! so the caller may write derived rows between batches on the same
//! connection and transaction.
//!
//! Postgres uses a server-side `NO SCROLL` cursor. Other backends page by
//! key (`"__id" > last ORDER BY "__id" LIMIT n`), which is stable because
//! the raw table is not modified during a scan.

use rand::Rng;

use super::error::{DbError, DbResult, SqlErrorKind};
use super::{Database, TableName};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::{Operand, Predicate, Query};

/// One raw row: its key and parsed JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub pkey: i64,
    pub doc: serde_json::Map<String, serde_json::Value>,
}

enum Mode {
    Server { name: String, open: bool },
    Keyset { last: i64 },
}

/// A forward-only scan of `(__id, jsonb)` in key order.
pub struct RawCursor {
    table: TableName,
    batch_size: u64,
    mode: Mode,
    done: bool,
    skipped: u64,
}

impl RawCursor {
    pub fn new(dialect: Dialect, table: TableName, batch_size: u64) -> Self {
        let mode = if dialect.supports_server_cursor() {
            let suffix: u32 = rand::rng().random();
            Mode::Server {
                name: format!("recordloom_scan_{:08x}", suffix),
                open: false,
            }
        } else {
            Mode::Keyset { last: 0 }
        };
        Self {
            table,
            batch_size: batch_size.max(1),
            mode,
            done: false,
            skipped: 0,
        }
    }

    /// Rows skipped because they did not hold a JSON object.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn select(&self) -> Query {
        Query::new()
            .text_column("__id")
            .text_column("jsonb")
            .from(self.table.schema(), self.table.name.clone())
    }

    /// Fetch the next batch. An empty batch means the scan is finished.
    pub fn next_batch(&mut self, db: &mut dyn Database) -> DbResult<Vec<RawDocument>> {
        while !self.done {
            let batch = self.fetch(db)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
        }
        Ok(Vec::new())
    }

    /// One round trip. May come back empty when every row was skipped.
    fn fetch(&mut self, db: &mut dyn Database) -> DbResult<Vec<RawDocument>> {
        let dialect = db.dialect();
        let sorted = self.select().order_by("__id");
        let batch_size = self.batch_size;

        let sql = match &mut self.mode {
            Mode::Server { name, open } => {
                if !*open {
                    let declare = format!(
                        "DECLARE {} NO SCROLL CURSOR FOR {}",
                        name,
                        sorted.to_sql(dialect)
                    );
                    db.execute(&declare, &[])?;
                    *open = true;
                }
                format!("FETCH FORWARD {} FROM {}", batch_size, name)
            }
            Mode::Keyset { last } => sorted
                .filter(Predicate::Gt("__id".into(), Operand::Int(*last)))
                .limit(batch_size)
                .to_sql(dialect),
        };

        let rows = db.query_strings(&sql, &[], 2)?;
        if (rows.len() as u64) < self.batch_size {
            self.done = true;
        }

        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            let pkey = row
                .first()
                .and_then(|v| v.as_deref())
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| {
                    DbError::sql(&sql, &[], SqlErrorKind::Other, "raw row without a numeric __id")
                })?;
            if let Mode::Keyset { last } = &mut self.mode {
                *last = pkey;
            }

            match row.get(1).and_then(|v| v.as_deref()).and_then(parse_object) {
                Some(doc) => batch.push(RawDocument { pkey, doc }),
                None => {
                    self.skipped += 1;
                    tracing::warn!(table = %self.table, pkey, "skipping raw row that is not a JSON object");
                }
            }
        }

        if self.done {
            self.close(db)?;
        }
        Ok(batch)
    }

    /// Release server-side resources. Safe to call more than once.
    pub fn close(&mut self, db: &mut dyn Database) -> DbResult<()> {
        self.done = true;
        if let Mode::Server { name, open } = &mut self.mode {
            if *open {
                *open = false;
                db.execute(&format!("CLOSE {}", name), &[])?;
            }
        }
        Ok(())
    }
}

fn parse_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}
