//! Indexes on the join columns of derived tables.

use sha2::{Digest, Sha256};

use crate::db::{ignore_idempotent, Database, DbResult};
use crate::sql::CreateIndex;
use crate::transform::Catalog;

/// Longest identifier Postgres keeps without truncating.
const MAX_IDENTIFIER: usize = 63;
/// Hex digits of the column hash kept in an index name.
const HASH_DIGITS: usize = 12;

/// `<table>_<12 hex digits of sha256("table.column")>`.
///
/// The table part is shortened so the whole name fits in
/// [`MAX_IDENTIFIER`] bytes.
pub fn index_name(table: &str, column: &str) -> String {
    let digest = Sha256::digest(format!("{}.{}", table, column).as_bytes());
    let hash: String = digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
        .chars()
        .take(HASH_DIGITS)
        .collect();

    let mut end = table.len().min(MAX_IDENTIFIER - HASH_DIGITS - 1);
    while !table.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}_{}", &table[..end], hash)
}

/// Index every ancestor-key and ordinal column in `catalog`.
pub fn create_indexes(db: &mut dyn Database, schema: Option<&str>, catalog: &Catalog) -> DbResult<usize> {
    let dialect = db.dialect();
    let mut created = 0;
    for table in catalog.tables() {
        for attr in table.join_keys() {
            let sql = CreateIndex::new(index_name(table.name(), &attr.name), table.name())
                .maybe_schema(schema)
                .column(attr.name.clone())
                .to_sql(dialect);
            tracing::debug!(%sql, "creating index");
            ignore_idempotent(db.execute_ddl(&sql))?;
            created += 1;
        }
    }
    tracing::info!(indexes = created, "indexes created");
    Ok(created)
}
