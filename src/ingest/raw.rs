//! The raw table: one row per fetched record.
//!
//! `<prefix>(__id INTEGER PRIMARY KEY, jsonb <json type>)`. Backends that
//! support it receive rows through binary COPY in chunks; the rest get one
//! parameterized INSERT per record.

use crate::db::{ignore_idempotent, Database, DbResult, Prefix, RawRow, TableName};
use crate::fetch::{FetchError, Record};
use crate::sql::{ColumnDef, CreateSchema, CreateTable, DataType, DropTable, Insert, Operand, SqlDialect};

use super::error::IngestResult;

/// Records buffered before a bulk copy is sent.
pub const COPY_CHUNK: usize = 10_000;

/// Create the prefix's schema if it names one.
pub fn ensure_schema(db: &mut dyn Database, schema: Option<&str>) -> DbResult<()> {
    let Some(schema) = schema else {
        return Ok(());
    };
    let sql = CreateSchema::new(schema).if_not_exists().to_sql(db.dialect());
    ignore_idempotent(db.execute_ddl(&sql))
}

/// Drop and re-create the raw table.
pub fn prepare_raw_table(db: &mut dyn Database, prefix: &Prefix) -> DbResult<()> {
    let dialect = db.dialect();
    ensure_schema(db, prefix.schema())?;
    drop_raw_table(db, prefix)?;
    let create = CreateTable::new(prefix.base())
        .maybe_schema(prefix.schema())
        .column(ColumnDef::new("__id", DataType::Int32).primary_key())
        .column(ColumnDef::new("jsonb", dialect.raw_json_type()))
        .to_sql(dialect);
    tracing::debug!(sql = %create, "creating raw table");
    db.execute_ddl(&create)
}

pub fn drop_raw_table(db: &mut dyn Database, prefix: &Prefix) -> DbResult<()> {
    let drop = DropTable::new(prefix.base())
        .maybe_schema(prefix.schema())
        .if_exists()
        .to_sql(db.dialect());
    ignore_idempotent(db.execute_ddl(&drop))
}

/// Streams records into the raw table.
pub struct RawLoader {
    table: TableName,
    insert: String,
    bulk: bool,
    pending: Vec<RawRow>,
    loaded: u64,
}

impl RawLoader {
    pub fn new(db: &dyn Database, prefix: &Prefix) -> Self {
        let dialect = db.dialect();
        let insert = Insert::into(prefix.base())
            .maybe_schema(prefix.schema())
            .columns(["__id", "jsonb"])
            .values([
                Operand::param(DataType::Int32),
                Operand::param(dialect.raw_json_type()),
            ])
            .to_sql(dialect);
        Self {
            table: prefix.raw_table().clone(),
            insert,
            bulk: dialect.supports_bulk_copy(),
            pending: Vec::new(),
            loaded: 0,
        }
    }

    /// Add one record. Bulk backends send a chunk once it fills.
    pub fn push(&mut self, db: &mut dyn Database, record: Record) -> IngestResult<()> {
        let json = String::from_utf8(record.json).map_err(|e| {
            let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
            FetchError::malformed(&self.table.to_string(), "record is not valid UTF-8", &lossy)
        })?;
        let row = RawRow {
            pkey: record.pkey,
            json,
        };
        if self.bulk {
            self.pending.push(row);
            if self.pending.len() >= COPY_CHUNK {
                self.flush(db)?;
            }
        } else {
            db.execute(&self.insert, &[row.pkey.into(), row.json.into()])?;
            self.loaded += 1;
        }
        Ok(())
    }

    fn flush(&mut self, db: &mut dyn Database) -> DbResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.loaded += db.copy_raw(&self.table, &self.pending)?;
        tracing::debug!(rows = self.loaded, "copied raw chunk");
        self.pending.clear();
        Ok(())
    }

    /// Send any buffered rows and return the number loaded.
    pub fn finish(mut self, db: &mut dyn Database) -> DbResult<u64> {
        self.flush(db)?;
        Ok(self.loaded)
    }
}
