//! Ingestion error types.

use thiserror::Error;

use crate::db::{DbError, PrefixError};
use crate::fetch::FetchError;
use crate::transform::TransformError;

/// Result type for ingestion runs.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that abort an ingestion run or a drop.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The request was rejected before any I/O.
    #[error("invalid ingest request: {0}")]
    InvalidConfig(String),

    /// The table prefix is not usable on this backend.
    #[error("invalid table prefix: {0}")]
    Prefix(#[from] PrefixError),

    /// Reading the remote collection failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A bookkeeping or raw-table statement failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Building or filling a derived table failed.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl IngestError {
    /// The SQL statement that failed, if the error came from one.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Db(e) => e.statement(),
            Self::Transform(TransformError::Scan(e))
            | Self::Transform(TransformError::Table { source: e, .. }) => e.statement(),
            _ => None,
        }
    }
}
