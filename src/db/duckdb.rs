//! DuckDB backend on the `duckdb` crate.

use duckdb::{params_from_iter, Connection};

use super::error::{classify_message, DbError, DbResult};
use super::{Database, SqlValue, TextRow};
use crate::sql::dialect::Dialect;

/// A DuckDB file or in-memory database.
///
/// DuckDB has no savepoints: a failed statement poisons the open
/// transaction. Cleanup paths therefore check existence or use `IF EXISTS`
/// rather than relying on swallowed errors.
pub struct DuckDbDatabase {
    conn: Connection,
    in_transaction: bool,
}

impl DuckDbDatabase {
    /// Open a database file, or an in-memory database for `:memory:`.
    pub fn open(path: &str) -> DbResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| DbError::Connect {
            driver: "duckdb",
            message: e.to_string(),
        })?;
        Ok(Self {
            conn,
            in_transaction: false,
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(":memory:")
    }

    fn fail(sql: &str, params: &[SqlValue], e: duckdb::Error) -> DbError {
        let message = e.to_string();
        DbError::sql(sql, params, classify_message(&message), message)
    }
}

impl Database for DuckDbDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let affected = self
            .conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| Self::fail(sql, params, e))?;
        Ok(affected as u64)
    }

    fn execute_ddl(&mut self, sql: &str) -> DbResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| Self::fail(sql, &[], e))
    }

    fn query_strings(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        columns: usize,
    ) -> DbResult<Vec<TextRow>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Self::fail(sql, params, e))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<duckdb::Result<TextRow>>()
            })
            .map_err(|e| Self::fail(sql, params, e))?;
        let result = rows
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(|e| Self::fail(sql, params, e));
        result
    }

    fn begin(&mut self) -> DbResult<()> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| Self::fail("BEGIN TRANSACTION", &[], e))?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        self.in_transaction = false;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| Self::fail("COMMIT", &[], e))
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.in_transaction = false;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| Self::fail("ROLLBACK", &[], e))
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}
