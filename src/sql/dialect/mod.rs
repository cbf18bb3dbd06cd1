//! SQL Dialect definitions and formatting rules.
//!
//! Each backend implements `SqlDialect` to describe how identifiers,
//! literals, parameters and column types are rendered, plus the
//! capabilities the ingestion pipeline branches on:
//!
//! | Capability | PostgreSQL | DuckDB | SQLite |
//! |------------|-----------|--------|--------|
//! | Binary bulk COPY | ✓ | ❌ | ❌ |
//! | Native JSON column | ✓ (JSONB) | ❌ | ❌ |
//! | Native UUID column | ✓ | ❌ | ❌ |
//! | Schemas | ✓ | ✓ | ❌ |
//! | Server-side cursor | ✓ | ❌ | ❌ |
//!
//! # Usage
//!
//! ```ignore
//! use recordloom::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```

mod duckdb;
pub mod helpers;
mod postgres;
mod sqlite;

pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use super::token::TokenStream;
use super::types::DataType;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations describe the embedded engines; PostgreSQL
/// overrides the pieces where it differs.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (schema, table, column, index).
    ///
    /// All supported backends use `"identifier"` with `""` escaping.
    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    /// Quote a string literal.
    ///
    /// Single quotes with `''` escaping. PostgreSQL overrides this with an
    /// escape-string literal so control characters survive verbatim.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    /// Format a NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// Render a bind parameter.
    ///
    /// `index` is 1-based. The type hint lets dialects with numbered,
    /// typed parameters pin the bind type (needed for NULL binds).
    fn format_placeholder(&self, index: usize, hint: Option<&DataType>) -> String {
        let _ = (index, hint);
        "?".into()
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit `LIMIT n`.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        helpers::emit_limit_standard(limit)
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Emit a column data type for this dialect.
    fn emit_data_type(&self, dt: &DataType) -> String {
        helpers::emit_data_type_ansi(dt)
    }

    /// Column type holding a raw JSON document.
    fn raw_json_type(&self) -> DataType {
        if self.supports_native_json() {
            DataType::Json
        } else {
            DataType::String
        }
    }

    /// Render `expr` cast to text.
    fn cast_to_text(&self, expr: &str) -> String {
        format!("{}::VARCHAR", expr)
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Whether raw rows can be loaded with a binary COPY stream.
    fn supports_bulk_copy(&self) -> bool {
        false
    }

    /// Whether raw documents are stored in a native JSON column.
    fn supports_native_json(&self) -> bool {
        false
    }

    /// Whether UUID-shaped strings get a native UUID column.
    fn supports_native_uuid(&self) -> bool {
        false
    }

    /// Whether tables can live in a named schema.
    fn supports_schemas(&self) -> bool {
        true
    }

    /// Whether large reads go through a named server-side cursor.
    fn supports_server_cursor(&self) -> bool {
        false
    }

    /// Whether this dialect supports IF EXISTS for DROP statements.
    fn supports_if_exists(&self) -> bool {
        true
    }

    /// Whether this dialect supports IF NOT EXISTS for CREATE statements.
    fn supports_if_not_exists(&self) -> bool {
        true
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn format_placeholder(&self, index: usize, hint: Option<&DataType>) -> String {
        self.dialect().format_placeholder(index, hint)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        self.dialect().emit_data_type(dt)
    }

    fn raw_json_type(&self) -> DataType {
        self.dialect().raw_json_type()
    }

    fn cast_to_text(&self, expr: &str) -> String {
        self.dialect().cast_to_text(expr)
    }

    fn supports_bulk_copy(&self) -> bool {
        self.dialect().supports_bulk_copy()
    }

    fn supports_native_json(&self) -> bool {
        self.dialect().supports_native_json()
    }

    fn supports_native_uuid(&self) -> bool {
        self.dialect().supports_native_uuid()
    }

    fn supports_schemas(&self) -> bool {
        self.dialect().supports_schemas()
    }

    fn supports_server_cursor(&self) -> bool {
        self.dialect().supports_server_cursor()
    }

    fn supports_if_exists(&self) -> bool {
        self.dialect().supports_if_exists()
    }

    fn supports_if_not_exists(&self) -> bool {
        self.dialect().supports_if_not_exists()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
