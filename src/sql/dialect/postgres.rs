//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features the pipeline relies on:
//! - ANSI identifier quoting (`"`)
//! - Escape-string literals (`E'...'`)
//! - Numbered, typed bind parameters (`$1::BIGINT`)
//! - JSONB raw storage and native UUID columns
//! - Binary COPY and named server-side cursors

use super::helpers;
use super::SqlDialect;
use crate::sql::types::DataType;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_escaped(s)
    }

    fn format_placeholder(&self, index: usize, hint: Option<&DataType>) -> String {
        match hint {
            Some(dt) => format!("${}::{}", index, self.emit_data_type(dt)),
            None => format!("${}", index),
        }
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        match dt {
            DataType::Json => "JSONB".into(),
            other => helpers::emit_data_type_ansi(other),
        }
    }

    fn supports_bulk_copy(&self) -> bool {
        true
    }

    fn supports_native_json(&self) -> bool {
        true
    }

    fn supports_native_uuid(&self) -> bool {
        true
    }

    fn supports_server_cursor(&self) -> bool {
        true
    }
}
