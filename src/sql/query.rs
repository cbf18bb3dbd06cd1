//! SELECT query builder.
//!
//! Covers the read shapes the pipeline needs: projected or text-cast
//! columns, a single keyset or equality predicate, ordering and a limit.

use super::dialect::{Dialect, SqlDialect};
use super::dml::Operand;
use super::token::{Token, TokenStream};

/// An item in the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    Column(String),
    /// Column read back as text.
    Text(String),
    /// Pre-rendered expression (e.g. `count(*)`), trusted input only.
    Raw(String),
}

/// A WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Operand),
    Gt(String, Operand),
}

/// SELECT statement.
#[derive(Debug, Clone, Default)]
#[must_use = "queries have no effect until converted to SQL with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub schema: Option<String>,
    pub from: Option<String>,
    pub filters: Vec<Predicate>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a plain column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.select.push(SelectExpr::Column(name.into()));
        self
    }

    /// Select a column cast to text.
    pub fn text_column(mut self, name: impl Into<String>) -> Self {
        self.select.push(SelectExpr::Text(name.into()));
        self
    }

    /// Select a trusted raw expression.
    pub fn raw(mut self, expr: impl Into<String>) -> Self {
        self.select.push(SelectExpr::Raw(expr.into()));
        self
    }

    /// Set the source table.
    pub fn from(mut self, schema: Option<&str>, table: impl Into<String>) -> Self {
        self.schema = schema.map(str::to_string);
        self.from = Some(table.into());
        self
    }

    /// Add an AND-ed predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Order ascending by a column.
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        let mut next_param = 0;

        ts.push(Token::Select).space();
        ts.comma_separated(self.select.iter().map(|item| match item {
            SelectExpr::Column(c) => Token::Ident(c.clone()),
            SelectExpr::Text(c) => Token::TextCast(c.clone()),
            SelectExpr::Raw(expr) => Token::Raw(expr.clone()),
        }));

        if let Some(from) = &self.from {
            ts.space().push(Token::From).space();
            ts.table_name(self.schema.as_deref(), from);
        }

        for (i, predicate) in self.filters.iter().enumerate() {
            ts.space()
                .push(if i == 0 { Token::Where } else { Token::And })
                .space();
            let (column, op, value) = match predicate {
                Predicate::Eq(c, v) => (c, Token::Eq, v),
                Predicate::Gt(c, v) => (c, Token::Gt, v),
            };
            ts.push(Token::Ident(column.clone()))
                .space()
                .push(op)
                .space()
                .push(value.to_token(&mut next_param));
        }

        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            ts.comma_separated(self.order_by.iter().cloned().map(Token::Ident));
        }

        if let Some(limit) = self.limit {
            ts.space().append(&dialect.emit_limit(limit));
        }

        ts
    }
}
