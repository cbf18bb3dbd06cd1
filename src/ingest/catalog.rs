//! The per-prefix catalog of derived tables.
//!
//! `<prefix>__tcatalog(table_name TEXT NOT NULL)` lists every derived table
//! a run created, schema-qualified when the prefix has a schema. Older loads
//! used `<prefix>_jtable`; both are honored when dropping.

use crate::db::{ignore_idempotent, Database, DbResult, Prefix, TableName};
use crate::sql::{ColumnDef, CreateTable, DataType, DropTable, Insert, Operand, Query};

/// Drop and re-create the catalog table listing `tables`.
pub fn write_catalog(db: &mut dyn Database, prefix: &Prefix, tables: &[String]) -> DbResult<TableName> {
    let dialect = db.dialect();
    let catalog = prefix.catalog_table();
    drop_table(db, &catalog)?;
    let create = CreateTable::new(catalog.name.clone())
        .maybe_schema(catalog.schema())
        .column(ColumnDef::new("table_name", DataType::String).not_null())
        .to_sql(dialect);
    db.execute_ddl(&create)?;

    let insert = Insert::into(catalog.name.clone())
        .maybe_schema(catalog.schema())
        .columns(["table_name"])
        .values([Operand::param(DataType::String)])
        .to_sql(dialect);
    for table in tables {
        let qualified = prefix.table(table.clone()).to_string();
        db.execute(&insert, &[qualified.into()])?;
    }
    Ok(catalog)
}

/// Table names listed in a catalog table. A missing catalog lists nothing.
pub fn read_catalog(db: &mut dyn Database, catalog: &TableName) -> DbResult<Vec<String>> {
    if !db.table_exists(catalog)? {
        return Ok(Vec::new());
    }
    let sql = Query::new()
        .text_column("table_name")
        .from(catalog.schema(), catalog.name.clone())
        .to_sql(db.dialect());
    let rows = db.query_strings(&sql, &[], 1)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect())
}

/// Drop every table listed in the prefix's catalogs, then the catalogs.
///
/// Returns the names dropped, catalogs included.
pub fn drop_extracted_tables(db: &mut dyn Database, prefix: &Prefix) -> DbResult<Vec<String>> {
    let mut dropped = Vec::new();
    for catalog in [prefix.catalog_table(), prefix.legacy_catalog_table()] {
        if !db.table_exists(&catalog)? {
            continue;
        }
        for name in read_catalog(db, &catalog)? {
            drop_table(db, &entry_table(prefix, &name))?;
            dropped.push(name);
        }
        drop_table(db, &catalog)?;
        dropped.push(catalog.to_string());
    }
    if !dropped.is_empty() {
        tracing::info!(prefix = %prefix, tables = dropped.len(), "dropped extracted tables");
    }
    Ok(dropped)
}

/// Resolve a catalog entry in the prefix's schema.
///
/// Entries are never split on `.`: derived names keep dots from JSON keys,
/// so only the prefix's own `schema.` is stripped.
fn entry_table(prefix: &Prefix, entry: &str) -> TableName {
    let bare = prefix
        .schema()
        .and_then(|schema| entry.strip_prefix(schema))
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(entry);
    prefix.table(bare)
}

pub(crate) fn drop_table(db: &mut dyn Database, table: &TableName) -> DbResult<()> {
    let sql = DropTable::new(table.name.clone())
        .maybe_schema(table.schema())
        .if_exists()
        .to_sql(db.dialect());
    tracing::debug!(%sql, "dropping table");
    ignore_idempotent(db.execute_ddl(&sql))
}
