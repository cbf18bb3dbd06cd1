//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use super::super::types::DataType;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
/// Used by: DuckDB, SQLite
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string as a PostgreSQL escape-string literal (`E'...'`).
///
/// Backslashes and control characters are written as C-style escapes so the
/// literal round-trips regardless of `standard_conforming_strings`.
pub fn quote_string_escaped(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    out.push_str("E'");
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{08}' => out.push_str("\\b"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit `LIMIT n` (standard SQL).
pub fn emit_limit_standard(limit: u64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Limit)
        .space()
        .push(Token::LitInt(limit as i64));
    ts
}

// =============================================================================
// Data Type Emission
// =============================================================================

/// Emit data type for ANSI/Postgres style.
/// Used by: Postgres
pub fn emit_data_type_ansi(dt: &DataType) -> String {
    match dt {
        DataType::Bool => "BOOLEAN".into(),
        DataType::Int32 => "INTEGER".into(),
        DataType::Int64 => "BIGINT".into(),
        DataType::Numeric => "NUMERIC".into(),
        DataType::String => "TEXT".into(),
        DataType::Json => "JSON".into(),
        DataType::Uuid => "UUID".into(),
    }
}

/// Emit data type for DuckDB.
///
/// Unbounded strings are `VARCHAR`; arbitrary JSON numbers land in `DOUBLE`
/// since DuckDB's `NUMERIC` defaults to a fixed `DECIMAL(18,3)`.
pub fn emit_data_type_duckdb(dt: &DataType) -> String {
    match dt {
        DataType::Numeric => "DOUBLE".into(),
        DataType::String | DataType::Json => "VARCHAR".into(),
        other => emit_data_type_ansi(other),
    }
}

/// Emit data type for SQLite (type affinities only).
pub fn emit_data_type_sqlite(dt: &DataType) -> String {
    match dt {
        DataType::Bool => "BOOLEAN".into(),
        DataType::Int32 | DataType::Int64 => "INTEGER".into(),
        DataType::Numeric => "NUMERIC".into(),
        _ => "TEXT".into(),
    }
}
