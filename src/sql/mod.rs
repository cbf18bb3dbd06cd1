//! SQL generation module.
//!
//! A small type-safe builder layer that renders the pipeline's statements
//! for each supported backend:
//!
//! - [`query`] - SELECT builder for raw scans and bookkeeping lookups
//! - [`ddl`] - CREATE SCHEMA / CREATE TABLE / DROP TABLE / CREATE INDEX
//! - [`dml`] - INSERT and DELETE with literals or bind parameters
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod query;
pub mod token;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use query::{Predicate, Query, SelectExpr};
pub use token::{Token, TokenStream};
pub use types::DataType;

// Re-export DDL types
pub use ddl::{ColumnDef, CreateIndex, CreateSchema, CreateTable, DropTable};

// Re-export DML types
pub use dml::{Delete, Insert, Operand};
