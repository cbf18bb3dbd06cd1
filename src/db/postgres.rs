//! PostgreSQL backend on `sqlx`.
//!
//! `sqlx` is async-only; the connection is driven by a private
//! current-thread runtime so the [`Database`] surface stays blocking.

use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::query::Query;
use sqlx::{Connection, Postgres, Row};
use tokio::runtime::{Builder, Runtime};

use super::copy::{copy_statement, CopyEncoder};
use super::error::{DbError, DbResult, SqlErrorKind};
use super::{Database, RawRow, SqlValue, TableName, TextRow};
use crate::sql::dialect::{Dialect, SqlDialect};

const DDL_SAVEPOINT: &str = "recordloom_ddl";

/// Rows sent per COPY chunk.
const COPY_CHUNK_ROWS: usize = 10_000;

/// A single PostgreSQL connection.
pub struct PostgresDatabase {
    rt: Runtime,
    conn: PgConnection,
    in_transaction: bool,
}

impl PostgresDatabase {
    /// Connect to a `postgres://` URL.
    pub fn connect(url: &str) -> DbResult<Self> {
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DbError::Runtime)?;
        let conn = rt
            .block_on(PgConnection::connect(url))
            .map_err(|e| DbError::Connect {
                driver: "postgres",
                message: e.to_string(),
            })?;
        Ok(Self {
            rt,
            conn,
            in_transaction: false,
        })
    }

    fn fail(sql: &str, params: &[SqlValue], e: sqlx::Error) -> DbError {
        DbError::sql(sql, params, classify(&e), e.to_string())
    }

    fn run_raw(&mut self, sql: &str) -> DbResult<u64> {
        let Self { rt, conn, .. } = self;
        rt.block_on(async { sqlx::raw_sql(sql).execute(&mut *conn).await })
            .map(|done| done.rows_affected())
            .map_err(|e| Self::fail(sql, &[], e))
    }
}

/// Map SQLSTATE codes onto the idempotent-cleanup classes.
fn classify(e: &sqlx::Error) -> SqlErrorKind {
    let Some(code) = e.as_database_error().and_then(|db| db.code()) else {
        return SqlErrorKind::Other;
    };
    match code.as_ref() {
        // undefined_table, invalid_schema_name, undefined_object
        "42P01" | "3F000" | "42704" => SqlErrorKind::MissingObject,
        // duplicate_table, duplicate_schema, duplicate_object
        "42P07" | "42P06" | "42710" => SqlErrorKind::AlreadyExists,
        _ => SqlErrorKind::Other,
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(n) => query.bind(*n),
            SqlValue::Float(x) => query.bind(*x),
            SqlValue::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

impl Database for PostgresDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        if params.is_empty() {
            return self.run_raw(sql);
        }
        let Self { rt, conn, .. } = self;
        let query = bind_all(sqlx::query(sql), params);
        rt.block_on(async { query.execute(&mut *conn).await })
            .map(|done| done.rows_affected())
            .map_err(|e| Self::fail(sql, params, e))
    }

    fn execute_ddl(&mut self, sql: &str) -> DbResult<()> {
        if !self.in_transaction {
            return self.run_raw(sql).map(|_| ());
        }
        // A failed statement aborts the whole transaction unless it is
        // fenced by a savepoint.
        self.run_raw(&format!("SAVEPOINT {}", DDL_SAVEPOINT))?;
        match self.run_raw(sql) {
            Ok(_) => {
                self.run_raw(&format!("RELEASE SAVEPOINT {}", DDL_SAVEPOINT))?;
                Ok(())
            }
            Err(e) => {
                self.run_raw(&format!("ROLLBACK TO SAVEPOINT {}", DDL_SAVEPOINT))?;
                self.run_raw(&format!("RELEASE SAVEPOINT {}", DDL_SAVEPOINT))?;
                Err(e)
            }
        }
    }

    fn query_strings(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        columns: usize,
    ) -> DbResult<Vec<TextRow>> {
        let Self { rt, conn, .. } = self;
        let rows = if params.is_empty() {
            rt.block_on(async { sqlx::raw_sql(sql).fetch_all(&mut *conn).await })
        } else {
            let query = bind_all(sqlx::query(sql), params);
            rt.block_on(async { query.fetch_all(&mut *conn).await })
        }
        .map_err(|e| Self::fail(sql, params, e))?;

        rows.iter()
            .map(|row| {
                (0..columns)
                    .map(|i| row.try_get::<Option<String>, _>(i))
                    .collect::<Result<TextRow, _>>()
                    .map_err(|e| Self::fail(sql, params, e))
            })
            .collect()
    }

    fn begin(&mut self) -> DbResult<()> {
        self.run_raw("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        self.in_transaction = false;
        self.run_raw("COMMIT").map(|_| ())
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.in_transaction = false;
        self.run_raw("ROLLBACK").map(|_| ())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn copy_raw(&mut self, table: &TableName, rows: &[RawRow]) -> DbResult<u64> {
        let dialect = self.dialect();
        let qualified = match table.schema() {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(&table.name)
            ),
            None => dialect.quote_identifier(&table.name),
        };
        let statement = copy_statement(&qualified);

        let mut copied = 0;
        for chunk in rows.chunks(COPY_CHUNK_ROWS) {
            let mut encoder = CopyEncoder::new();
            for row in chunk {
                encoder
                    .push(row)
                    .map_err(|message| DbError::sql(&statement, &[], SqlErrorKind::Other, message))?;
            }
            let data = encoder.finish();

            let Self { rt, conn, .. } = self;
            copied += rt
                .block_on(async {
                    let mut copy = conn.copy_in_raw(&statement).await?;
                    copy.send(data).await?;
                    copy.finish().await
                })
                .map_err(|e| Self::fail(&statement, &[], e))?;
            tracing::debug!(table = %table, rows = chunk.len(), "copied raw chunk");
        }
        Ok(copied)
    }
}
