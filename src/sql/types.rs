//! SQL-level data types for DDL generation.
//!
//! The set is deliberately small: it covers the column types inferred from
//! JSON documents, the raw document column, and the bookkeeping tables.
//! Dialects map each variant to a concrete type name via
//! [`SqlDialect::emit_data_type`](super::dialect::SqlDialect::emit_data_type).

/// SQL-level data type for DDL generation.
///
/// # Examples
///
/// ```ignore
/// use recordloom::sql::dialect::{Dialect, SqlDialect};
/// use recordloom::sql::types::DataType;
///
/// assert_eq!(Dialect::Postgres.emit_data_type(&DataType::Json), "JSONB");
/// assert_eq!(Dialect::Sqlite.emit_data_type(&DataType::Uuid), "TEXT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type.
    Bool,

    /// 32-bit signed integer (INTEGER).
    Int32,

    /// 64-bit signed integer (BIGINT).
    Int64,

    /// Arbitrary-precision number (NUMERIC without precision).
    Numeric,

    /// Variable-length string (TEXT, VARCHAR without limit).
    String,

    /// JSON document.
    Json,

    /// UUID type.
    Uuid,
}
