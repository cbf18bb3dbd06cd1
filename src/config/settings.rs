//! TOML-based configuration for recordloom.
//!
//! Supports a config file (recordloom.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [remote]
//! base_url = "https://okapi.example.org"
//! tenant = "diku"
//! token = "${OKAPI_TOKEN}"
//! timeout_secs = 60
//! retries = 2
//! page_size = 1000
//!
//! [database]
//! driver = "duckdb"
//! connection_string = "./ld.duckdb"
//!
//! [ingest]
//! max_depth = 3
//! keep_raw = true
//! create_indexes = true
//! scan_batch_size = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::connection::{ConnectionConfig, Driver};

/// Deepest nesting the transform will expand.
pub const MAX_EXPANSION_DEPTH: u32 = 4;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// The remote collection service.
    pub remote: RemoteSettings,

    /// Destination database.
    pub database: ConnectionSettings,

    /// Ingestion defaults.
    pub ingest: IngestSettings,
}

/// Remote (Okapi) service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base URL, e.g. `https://okapi.example.org`.
    pub base_url: String,

    /// Value of the `x-okapi-tenant` header.
    pub tenant: String,

    /// Value of the `x-okapi-token` header (supports ${ENV_VAR} expansion).
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after a timed-out request.
    pub retries: u32,

    /// Records requested per page.
    pub page_size: u32,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            tenant: String::new(),
            token: None,
            timeout_secs: 60,
            retries: 2,
            page_size: 1000,
        }
    }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the base URL with environment variables expanded.
    pub fn resolved_base_url(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.base_url)
    }

    /// Get the token with environment variables expanded.
    pub fn resolved_token(&self) -> Result<Option<String>, SettingsError> {
        self.token.as_deref().map(expand_env_vars).transpose()
    }
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Database driver (duckdb, postgres, sqlite).
    pub driver: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            driver: Driver::DuckDb.as_str().to_string(),
            connection_string: ":memory:".to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
            .map_err(|_| SettingsError::UnsupportedDriver(self.driver.clone()))
    }

    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }

    /// Resolve into a connection target.
    pub fn to_connection_config(&self) -> Result<ConnectionConfig, SettingsError> {
        let config = ConnectionConfig::new(self.driver_type()?, self.resolved_connection_string()?);
        config
            .validate()
            .map_err(|e| SettingsError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }
}

/// Ingestion defaults, overridable per request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Expansion depth (0 disables the transform).
    pub max_depth: u32,

    /// Keep the raw table after the transform.
    pub keep_raw: bool,

    /// Index quasi-key and ordinal columns.
    pub create_indexes: bool,

    /// Raw rows read per cursor fetch.
    pub scan_batch_size: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_depth: 3,
            keep_raw: true,
            create_indexes: true,
            scan_batch_size: 1000,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `RECORDLOOM_CONFIG`
    /// 2. `./recordloom.toml`
    /// 3. `~/.config/recordloom/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("RECORDLOOM_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("recordloom.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("recordloom").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Check ranges before any I/O happens.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ingest.max_depth > MAX_EXPANSION_DEPTH {
            return Err(SettingsError::InvalidConfig(format!(
                "ingest.max_depth must be at most {}, got {}",
                MAX_EXPANSION_DEPTH, self.ingest.max_depth
            )));
        }
        if self.remote.page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "remote.page_size must be positive".to_string(),
            ));
        }
        if self.ingest.scan_batch_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "ingest.scan_batch_size must be positive".to_string(),
            ));
        }
        self.database.driver_type()?;
        Ok(())
    }

    /// Like [`validate`](Self::validate), and also require a remote to talk to.
    pub fn validate_remote(&self) -> Result<(), SettingsError> {
        self.validate()?;
        if self.remote.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "remote.base_url must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // A lone $ is kept
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
