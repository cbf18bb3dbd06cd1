//! SQLite SQL dialect.
//!
//! SQLite has no schemas and only type affinities; text casts use the
//! standard `CAST(expr AS TEXT)` form.

use super::helpers;
use super::SqlDialect;
use crate::sql::types::DataType;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        helpers::emit_data_type_sqlite(dt)
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({} AS TEXT)", expr)
    }

    fn supports_schemas(&self) -> bool {
        false
    }
}
