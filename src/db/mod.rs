//! Destination database access.
//!
//! Every backend implements [`Database`], a small synchronous surface of
//! statement execution, text-valued reads and explicit transactions. The
//! pipeline above never branches on backend identity; it asks the
//! [`Dialect`] for capabilities instead.
//!
//! # Backends
//!
//! | Driver   | Type                 | Feature    |
//! |----------|----------------------|------------|
//! | SQLite   | [`SqliteDatabase`]   | always     |
//! | DuckDB   | `DuckDbDatabase`     | `duckdb`   |
//! | Postgres | `PostgresDatabase`   | `postgres` |

pub mod copy;
pub mod cursor;
pub mod error;
pub mod prefix;
pub mod value;

mod sqlite;
#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "postgres")]
mod postgres;

pub use cursor::RawCursor;
pub use error::{ignore_idempotent, DbError, DbResult, SqlErrorKind};
pub use prefix::{Prefix, PrefixError, TableName};
pub use sqlite::SqliteDatabase;
pub use value::SqlValue;

#[cfg(feature = "duckdb")]
pub use self::duckdb::DuckDbDatabase;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresDatabase;

use crate::config::{ConnectionConfig, Driver};
use crate::sql::dialect::{Dialect, SqlDialect};

/// One fetched record as stored in the raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub pkey: i64,
    pub json: String,
}

/// A text-valued result row. Every selected expression must be cast to text.
pub type TextRow = Vec<Option<String>>;

/// A connection to one destination database.
///
/// Implementations own their connection exclusively; a run holds it by
/// `&mut` for its whole duration.
pub trait Database {
    /// The dialect statements for this backend must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64>;

    /// Execute a DDL statement.
    ///
    /// Inside a transaction a failure must leave the transaction usable, so
    /// callers can swallow idempotent errors with [`ignore_idempotent`].
    fn execute_ddl(&mut self, sql: &str) -> DbResult<()>;

    /// Run a query whose `columns` selected expressions are all text.
    fn query_strings(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        columns: usize,
    ) -> DbResult<Vec<TextRow>>;

    fn begin(&mut self) -> DbResult<()>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// Whether a transaction opened with [`begin`](Self::begin) is pending.
    fn in_transaction(&self) -> bool;

    /// Whether `table` exists.
    fn table_exists(&mut self, table: &TableName) -> DbResult<bool> {
        let sql = table_exists_sql(self.dialect(), table);
        let rows = self.query_strings(&sql, &[], 1)?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(|count| count.as_deref())
            .and_then(|count| count.parse::<u64>().ok())
            .is_some_and(|count| count > 0))
    }

    /// Bulk-load raw rows. Only backends whose dialect reports
    /// `supports_bulk_copy` implement this.
    fn copy_raw(&mut self, _table: &TableName, _rows: &[RawRow]) -> DbResult<u64> {
        Err(DbError::Unsupported {
            driver: self.dialect().name(),
            operation: "bulk copy",
        })
    }
}

/// Catalog lookup for a table, returning one text count.
pub fn table_exists_sql(dialect: Dialect, table: &TableName) -> String {
    let name = dialect.quote_string(&table.name);
    match dialect {
        Dialect::Sqlite => format!(
            "SELECT {} FROM sqlite_master WHERE type = 'table' AND name = {}",
            dialect.cast_to_text("count(*)"),
            name
        ),
        Dialect::DuckDb | Dialect::Postgres => {
            let schema = table
                .schema()
                .map(|s| dialect.quote_string(s))
                .unwrap_or_else(|| "current_schema()".to_string());
            format!(
                "SELECT {} FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
                dialect.cast_to_text("count(*)"),
                schema,
                name
            )
        }
    }
}

/// Open a connection for the configured driver.
pub fn open(config: &ConnectionConfig) -> DbResult<Box<dyn Database>> {
    let target = config.to_connection_string();
    tracing::debug!(driver = config.driver_name(), "opening database");
    match config.driver {
        Driver::Sqlite => Ok(Box::new(SqliteDatabase::open(&target)?)),
        #[cfg(feature = "duckdb")]
        Driver::DuckDb => Ok(Box::new(DuckDbDatabase::open(&target)?)),
        #[cfg(feature = "postgres")]
        Driver::Postgres => Ok(Box::new(PostgresDatabase::connect(&target)?)),
        #[allow(unreachable_patterns)]
        other => Err(DbError::Connect {
            driver: other.as_str(),
            message: format!(
                "recordloom was built without the `{}` feature",
                other.as_str()
            ),
        }),
    }
}
