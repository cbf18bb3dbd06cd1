//! DuckDB SQL dialect.
//!
//! DuckDB is PostgreSQL-compatible in the parts the pipeline uses:
//! - ANSI identifier quoting (`"`)
//! - `expr::VARCHAR` casts and schemas
//! - positional `?` parameters
//!
//! Raw documents are kept as `VARCHAR` rather than the JSON extension type.

use super::helpers;
use super::SqlDialect;
use crate::sql::types::DataType;

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        helpers::emit_data_type_duckdb(dt)
    }
}
