//! Database connection configuration.
//!
//! A [`ConnectionConfig`] pairs a [`Driver`] with its target: a file path,
//! `:memory:`, or a `postgres://` URL.

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Unsupported driver: {0}. Supported: duckdb, postgres, sqlite")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    /// DuckDB (file or in-memory)
    #[default]
    DuckDb,
    /// PostgreSQL server
    Postgres,
    /// SQLite (file or in-memory)
    Sqlite,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "duckdb" | "duck" => Ok(Driver::DuckDb),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::DuckDb => "duckdb",
            Driver::Postgres => "postgres",
            Driver::Sqlite => "sqlite",
        }
    }
}

/// A resolved database connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Database driver.
    pub driver: Driver,
    /// File path or `:memory:` for embedded drivers, a URL for Postgres.
    pub target: String,
}

impl ConnectionConfig {
    pub fn new(driver: Driver, target: impl Into<String>) -> Self {
        Self {
            driver,
            target: target.into(),
        }
    }

    /// Create a new connection config for SQLite.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(Driver::Sqlite, path)
    }

    /// Create a new connection config for DuckDB.
    pub fn duckdb(path: impl Into<String>) -> Self {
        Self::new(Driver::DuckDb, path)
    }

    /// Create a new connection config for a Postgres URL.
    pub fn postgres(url: impl Into<String>) -> Self {
        Self::new(Driver::Postgres, url)
    }

    /// Reject targets the driver cannot open.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.driver == Driver::Postgres
            && !(self.target.starts_with("postgres://") || self.target.starts_with("postgresql://"))
        {
            return Err(ConnectionError::InvalidConfig(format!(
                "postgres connection string must be a postgres:// URL, got {:?}",
                self.target
            )));
        }
        Ok(())
    }

    /// The string handed to the driver.
    pub fn to_connection_string(&self) -> String {
        match self.driver {
            Driver::Postgres => self.target.clone(),
            Driver::DuckDb | Driver::Sqlite => {
                if self.target.is_empty() || self.target == ":memory:" {
                    ":memory:".to_string()
                } else {
                    self.target.clone()
                }
            }
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.as_str()
    }
}
