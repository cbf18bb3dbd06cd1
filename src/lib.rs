//! # recordloom
//!
//! Loads a paged remote JSON collection into a relational database and
//! normalizes it into flat tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Remote collection (Okapi / FOLIO)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [fetch]   stats, keyset / offset / stream paging
//! ┌─────────────────────────────────────────────────────────┐
//! │                Raw table  <prefix>(__id, jsonb)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [transform::infer]   first pass: catalog
//! ┌─────────────────────────────────────────────────────────┐
//! │        Catalog (tables, columns, types, ordinals)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [transform::materialize]   second pass: rows
//! ┌─────────────────────────────────────────────────────────┐
//! │   <prefix>__t, <prefix>__t__<array>, ... + __tcatalog    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ingest::Ingestor`] drives the whole pipeline inside one transaction
//! against DuckDB, PostgreSQL or SQLite; [`sql`] renders every statement
//! for the target dialect.

pub mod config;
pub mod db;
pub mod fetch;
pub mod ingest;
pub mod sql;
pub mod transform;

pub use config::{ConnectionConfig, Driver, Settings};
pub use db::{Database, DbError, Prefix};
pub use fetch::{FetchError, HttpTransport, QueryFilter, Transport};
pub use ingest::{Flow, IngestError, IngestOutcome, IngestRequest, Ingestor, Progress};
pub use sql::{Dialect, SqlDialect};
