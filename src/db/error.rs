//! Database error types.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Coarse classification of a failed statement.
///
/// Cleanup paths tolerate `MissingObject` and `AlreadyExists`; everything
/// else aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    /// The table, schema or index does not exist.
    MissingObject,
    /// The object being created already exists.
    AlreadyExists,
    /// Any other failure.
    Other,
}

/// Errors raised by a [`Database`](super::Database) backend.
#[derive(Error, Debug)]
pub enum DbError {
    /// Opening the connection failed.
    #[error("failed to connect to {driver} database: {message}")]
    Connect {
        /// Driver name.
        driver: &'static str,
        /// Backend error text.
        message: String,
    },

    /// A statement failed. Carries the statement text so callers can report
    /// exactly what was executed.
    #[error("error executing SQL: {statement}: {message}")]
    Sql {
        /// The SQL text that failed.
        statement: String,
        /// Rendered bind parameters, if any.
        params: Vec<String>,
        /// Classification used by idempotent cleanup.
        kind: SqlErrorKind,
        /// Backend error text.
        message: String,
    },

    /// The backend cannot perform the requested operation.
    #[error("{driver} does not support {operation}")]
    Unsupported {
        /// Driver name.
        driver: &'static str,
        /// Operation name.
        operation: &'static str,
    },

    /// The async runtime backing a driver could not be created.
    #[error("failed to start database runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl DbError {
    /// Build a statement failure.
    pub fn sql(
        statement: impl Into<String>,
        params: &[super::SqlValue],
        kind: SqlErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Sql {
            statement: statement.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            kind,
            message: message.into(),
        }
    }

    /// Whether the failure reports a missing table, schema or index.
    pub fn is_missing_object(&self) -> bool {
        matches!(
            self,
            Self::Sql {
                kind: SqlErrorKind::MissingObject,
                ..
            }
        )
    }

    /// Whether the failure reports an object that already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Sql {
                kind: SqlErrorKind::AlreadyExists,
                ..
            }
        )
    }

    /// The failing statement text, if this is a statement error.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Sql { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

/// Classify a backend error message by its wording.
///
/// SQLite and DuckDB only expose text, so this is the best signal available.
pub(crate) fn classify_message(message: &str) -> SqlErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("no such table")
        || lower.contains("no such index")
        || lower.contains("does not exist")
    {
        SqlErrorKind::MissingObject
    } else if lower.contains("already exists") {
        SqlErrorKind::AlreadyExists
    } else {
        SqlErrorKind::Other
    }
}

/// Swallow errors that only report the desired end state.
///
/// Dropping something that is already gone, or creating something that is
/// already there, counts as success.
pub fn ignore_idempotent<T: Default>(result: DbResult<T>) -> DbResult<T> {
    match result {
        Err(e) if e.is_missing_object() || e.is_already_exists() => {
            tracing::debug!(error = %e, "ignoring idempotent failure");
            Ok(T::default())
        }
        other => other,
    }
}
