//! Load history: one row per prefix describing its latest successful run.

use chrono::{SecondsFormat, Utc};

use crate::db::{ignore_idempotent, Database, DbResult, TableName};
use crate::sql::{
    ColumnDef, CreateSchema, CreateTable, DataType, Delete, Dialect, Insert, Operand, Predicate,
    Query, SqlDialect,
};

/// Schema holding bookkeeping tables on backends with schemas.
pub const SYSTEM_SCHEMA: &str = "recordloom_system";
const TABLE: &str = "load_history";

const COLUMNS: [&str; 8] = [
    "table_name",
    "query",
    "start_utc",
    "download_complete_utc",
    "scan_complete_utc",
    "transformation_complete_utc",
    "index_complete_utc",
    "row_count",
];

/// Where the history lives for `dialect`.
pub fn history_table(dialect: Dialect) -> TableName {
    if dialect.supports_schemas() {
        TableName::new(Some(SYSTEM_SCHEMA), TABLE)
    } else {
        TableName::new(None, format!("{}__{}", SYSTEM_SCHEMA, TABLE))
    }
}

/// Current UTC time as RFC 3339 text.
pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Timestamps and totals of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadHistory {
    /// Prefix the run wrote, schema-qualified if it has a schema.
    pub table_name: String,
    /// Filter the collection was read with.
    pub query: String,
    pub start_utc: String,
    pub download_complete_utc: Option<String>,
    pub scan_complete_utc: Option<String>,
    pub transformation_complete_utc: Option<String>,
    pub index_complete_utc: Option<String>,
    pub row_count: i64,
}

impl LoadHistory {
    pub fn start(table_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            query: query.into(),
            start_utc: now_utc(),
            ..Default::default()
        }
    }
}

fn ensure_history_table(db: &mut dyn Database) -> DbResult<TableName> {
    let dialect = db.dialect();
    let table = history_table(dialect);
    if let Some(schema) = table.schema() {
        let sql = CreateSchema::new(schema).if_not_exists().to_sql(dialect);
        ignore_idempotent(db.execute_ddl(&sql))?;
    }
    let mut key = ColumnDef::new("table_name", DataType::String).not_null();
    // DuckDB checks unique keys eagerly, so a delete and re-insert of the
    // same key in one transaction would fail there.
    if dialect != Dialect::DuckDb {
        key = key.unique();
    }
    let mut create = CreateTable::new(table.name.clone())
        .maybe_schema(table.schema())
        .if_not_exists()
        .column(key);
    for column in &COLUMNS[1..7] {
        create = create.column(ColumnDef::new(*column, DataType::String));
    }
    let create = create.column(ColumnDef::new("row_count", DataType::Int64));
    ignore_idempotent(db.execute_ddl(&create.to_sql(dialect)))?;
    Ok(table)
}

/// Replace the history row for `entry.table_name`.
pub fn record_load(db: &mut dyn Database, entry: &LoadHistory) -> DbResult<()> {
    let table = ensure_history_table(db)?;
    let dialect = db.dialect();
    delete_row(db, &table, &entry.table_name)?;

    let mut values: Vec<Operand> = COLUMNS[..7]
        .iter()
        .map(|_| Operand::param(DataType::String))
        .collect();
    values.push(Operand::param(DataType::Int64));
    let insert = Insert::into(table.name.clone())
        .maybe_schema(table.schema())
        .columns(COLUMNS)
        .values(values)
        .to_sql(dialect);
    db.execute(
        &insert,
        &[
            entry.table_name.clone().into(),
            entry.query.clone().into(),
            entry.start_utc.clone().into(),
            entry.download_complete_utc.clone().into(),
            entry.scan_complete_utc.clone().into(),
            entry.transformation_complete_utc.clone().into(),
            entry.index_complete_utc.clone().into(),
            entry.row_count.into(),
        ],
    )?;
    Ok(())
}

/// Delete the history row for `key`, if the history exists.
pub fn remove_load(db: &mut dyn Database, key: &str) -> DbResult<()> {
    let table = history_table(db.dialect());
    if db.table_exists(&table)? {
        delete_row(db, &table, key)?;
    }
    Ok(())
}

/// The history row for `key`.
pub fn read_load(db: &mut dyn Database, key: &str) -> DbResult<Option<LoadHistory>> {
    let table = history_table(db.dialect());
    if !db.table_exists(&table)? {
        return Ok(None);
    }
    let query = COLUMNS
        .iter()
        .fold(Query::new(), |q, c| q.text_column(*c))
        .from(table.schema(), table.name.clone())
        .filter(Predicate::Eq("table_name".into(), Operand::param(DataType::String)))
        .to_sql(db.dialect());
    let rows = db.query_strings(&query, &[key.into()], COLUMNS.len())?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let mut cells = row.into_iter();
    let mut next = || cells.next().flatten();
    Ok(Some(LoadHistory {
        table_name: next().unwrap_or_default(),
        query: next().unwrap_or_default(),
        start_utc: next().unwrap_or_default(),
        download_complete_utc: next(),
        scan_complete_utc: next(),
        transformation_complete_utc: next(),
        index_complete_utc: next(),
        row_count: next().and_then(|n| n.parse().ok()).unwrap_or_default(),
    }))
}

fn delete_row(db: &mut dyn Database, table: &TableName, key: &str) -> DbResult<u64> {
    let sql = Delete::from(table.name.clone())
        .maybe_schema(table.schema())
        .where_eq("table_name", Operand::param(DataType::String))
        .to_sql(db.dialect());
    db.execute(&sql, &[key.into()])
}
