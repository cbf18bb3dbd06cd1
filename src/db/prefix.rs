//! Table naming: qualified names and the `[schema.]base` run prefix.
//!
//! A prefix names the raw table directly and every other table of a run is
//! derived from its base:
//!
//! ```text
//! folio.users              raw table
//! folio.users__t           root derived table
//! folio.users__t__items    child table for the `items` array
//! folio.users__tcatalog    catalog of derived tables
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::sql::dialect::{Dialect, SqlDialect};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Invalid prefix or table name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("prefix must not be empty")]
    Empty,

    #[error("prefix {0:?} has more than one '.'")]
    TooManyParts(String),

    #[error("{0:?} is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("prefix {prefix:?} names a schema, which {dialect} does not support")]
    SchemaUnsupported { prefix: String, dialect: Dialect },
}

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.into(),
        }
    }

    /// Parse `name` or `schema.name`. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Some(Self::new(None, *name)),
            [schema, name] if !schema.is_empty() && !name.is_empty() => {
                Some(Self::new(Some(schema), *name))
            }
            _ => None,
        }
    }

    /// A table with the given name in the same schema.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            schema: self.schema.clone(),
            name: name.into(),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The user-supplied name that roots every table of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    raw: TableName,
}

impl Prefix {
    /// Parse `base` or `schema.base`; both parts must be plain identifiers.
    pub fn parse(s: &str) -> Result<Self, PrefixError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PrefixError::Empty);
        }
        if s.matches('.').count() > 1 {
            return Err(PrefixError::TooManyParts(s.to_string()));
        }
        let raw = TableName::parse(s).ok_or_else(|| PrefixError::InvalidIdentifier(s.to_string()))?;
        for part in raw.schema.iter().chain(std::iter::once(&raw.name)) {
            if !IDENTIFIER.is_match(part) {
                return Err(PrefixError::InvalidIdentifier(part.clone()));
            }
        }
        Ok(Self { raw })
    }

    /// Parse and check the prefix against the target dialect.
    pub fn parse_for(s: &str, dialect: Dialect) -> Result<Self, PrefixError> {
        let prefix = Self::parse(s)?;
        if prefix.schema().is_some() && !dialect.supports_schemas() {
            return Err(PrefixError::SchemaUnsupported {
                prefix: s.to_string(),
                dialect,
            });
        }
        Ok(prefix)
    }

    pub fn schema(&self) -> Option<&str> {
        self.raw.schema()
    }

    pub fn base(&self) -> &str {
        &self.raw.name
    }

    /// The table holding one row per fetched record.
    pub fn raw_table(&self) -> &TableName {
        &self.raw
    }

    /// Name of the root derived table, without schema.
    pub fn root_table_name(&self) -> String {
        format!("{}__t", self.raw.name)
    }

    /// A derived table in the prefix's schema.
    pub fn table(&self, name: impl Into<String>) -> TableName {
        self.raw.sibling(name)
    }

    /// The table listing every derived table of the last run.
    pub fn catalog_table(&self) -> TableName {
        self.raw.sibling(format!("{}__tcatalog", self.raw.name))
    }

    /// The catalog name used by older releases; cleaned up alongside the
    /// current one.
    pub fn legacy_catalog_table(&self) -> TableName {
        self.raw.sibling(format!("{}_jtable", self.raw.name))
    }

    /// Key of this prefix in the load history.
    pub fn history_key(&self) -> String {
        self.raw.to_string()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}
