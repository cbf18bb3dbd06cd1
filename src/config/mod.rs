//! Configuration module for recordloom.
//!
//! Handles connection configuration, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver};
pub use settings::{
    expand_env_vars, ConnectionSettings, IngestSettings, RemoteSettings, Settings, SettingsError,
    MAX_EXPANSION_DEPTH,
};
