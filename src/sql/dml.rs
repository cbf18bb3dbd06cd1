//! DML (Data Manipulation Language) support.
//!
//! INSERT and DELETE builders. Values are either literals, rendered through
//! the dialect's quoting rules, or bind parameters numbered in the order they
//! appear in the statement.

use super::dialect::Dialect;
use super::token::{Token, TokenStream};
use super::types::DataType;

/// A value slot in an INSERT row or a WHERE comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Bind parameter with an optional type hint.
    Param(Option<DataType>),
}

impl Operand {
    /// Bind parameter typed as `dt`.
    pub fn param(dt: DataType) -> Self {
        Operand::Param(Some(dt))
    }

    /// Render as a token, numbering bind parameters from `next_param`.
    pub(super) fn to_token(&self, next_param: &mut usize) -> Token {
        match self {
            Operand::Null => Token::LitNull,
            Operand::Bool(b) => Token::LitBool(*b),
            Operand::Int(n) => Token::LitInt(*n),
            Operand::Float(f) => Token::LitFloat(*f),
            Operand::Str(s) => Token::LitString(s.clone()),
            Operand::Param(hint) => {
                *next_param += 1;
                Token::Placeholder(*next_param, hint.clone())
            }
        }
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Str(s.to_string())
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Operand::Str(s)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Int(n)
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Bool(b)
    }
}

// ============================================================================
// INSERT
// ============================================================================

/// INSERT statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Insert {
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Operand>>,
}

impl Insert {
    /// Create a new INSERT statement.
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Set the schema when one is given.
    pub fn maybe_schema(mut self, schema: Option<&str>) -> Self {
        self.schema = schema.map(str::to_string);
        self
    }

    /// Set the columns to insert.
    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Add a row of values.
    pub fn values(mut self, vals: impl IntoIterator<Item = impl Into<Operand>>) -> Self {
        self.values.push(vals.into_iter().map(|v| v.into()).collect());
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        let mut next_param = 0;

        ts.push(Token::Insert).space().push(Token::Into).space();
        ts.table_name(self.schema.as_deref(), &self.table);

        if !self.columns.is_empty() {
            ts.space().lparen();
            ts.comma_separated(self.columns.iter().cloned().map(Token::Ident));
            ts.rparen();
        }

        ts.space().push(Token::Values).space();
        for (i, row) in self.values.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.lparen();
            let tokens: Vec<Token> = row.iter().map(|v| v.to_token(&mut next_param)).collect();
            ts.comma_separated(tokens);
            ts.rparen();
        }

        ts
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// DELETE statement with an optional equality filter.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Delete {
    pub schema: Option<String>,
    pub table: String,
    pub filter: Option<(String, Operand)>,
}

impl Delete {
    /// Create a new DELETE statement.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            filter: None,
        }
    }

    /// Set the schema when one is given.
    pub fn maybe_schema(mut self, schema: Option<&str>) -> Self {
        self.schema = schema.map(str::to_string);
        self
    }

    /// Restrict to rows where `column = value`.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.filter = Some((column.into(), value.into()));
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        let mut next_param = 0;

        ts.push(Token::Delete).space().push(Token::From).space();
        ts.table_name(self.schema.as_deref(), &self.table);

        if let Some((column, value)) = &self.filter {
            ts.space()
                .push(Token::Where)
                .space()
                .push(Token::Ident(column.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .push(value.to_token(&mut next_param));
        }

        ts
    }
}
