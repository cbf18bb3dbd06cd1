//! JSON to relational transformation.
//!
//! Two passes over a raw table of JSON documents:
//!
//! 1. [`infer::scan`] walks every document and builds a [`Catalog`] of
//!    derived tables and columns; [`infer::create_tables`] turns it into DDL.
//! 2. [`materialize::materialize`] walks the documents again and inserts one
//!    row per (table, logical row).
//!
//! Nested objects flatten into their parent's table with a `field__` column
//! prefix. Arrays become child tables that repeat their ancestors' scalar
//! columns (the quasi-key) plus a 1-based ordinal column.

pub mod camel;
pub mod catalog;
pub mod infer;
pub mod materialize;
pub mod path;

pub use camel::decode_camel_case;
pub use catalog::{Attr, Catalog, ColumnType, OrdinalClass, TableDescriptor};
pub use infer::infer_document;
pub use materialize::{coerce, Cell, Materializer, Row, RowCounters};
pub use path::TablePath;

use thiserror::Error;

use crate::db::DbError;

/// Result type for transform passes.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors raised while building or filling derived tables.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Reading the raw table failed.
    #[error("scanning raw table: {0}")]
    Scan(#[from] DbError),

    /// A statement against one derived table failed.
    #[error("writing derived table {table}: {source}")]
    Table {
        table: String,
        #[source]
        source: DbError,
    },
}

impl TransformError {
    pub fn table(table: impl Into<String>, source: DbError) -> Self {
        Self::Table {
            table: table.into(),
            source,
        }
    }

    /// The derived table involved, if any.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::Table { table, .. } => Some(table),
            Self::Scan(_) => None,
        }
    }
}

/// Knobs shared by both passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Nesting levels to expand. 0 disables the transform.
    pub max_depth: u32,
    /// Detect UUID strings as a native column type.
    pub native_uuid: bool,
    /// Raw rows read per cursor fetch.
    pub batch_size: u64,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            native_uuid: false,
            batch_size: 1000,
        }
    }
}
