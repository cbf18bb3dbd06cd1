//! Materialization: the second pass over the raw table.
//!
//! Documents are walked against the finished [`Catalog`] and turned into
//! [`Row`]s, one per (table, logical row). Each table numbers its rows with
//! its own counter from [`RowCounters`].

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::camel::decode_camel_case;
use super::catalog::{Catalog, ColumnType, TableDescriptor};
use super::path::TablePath;
use super::{TransformError, TransformOptions, TransformResult};
use crate::db::{Database, RawCursor, SqlValue, TableName};
use crate::sql::{Insert, Operand};

/// Next `__id` for every derived table of one run. Counters start at 1.
#[derive(Debug, Default)]
pub struct RowCounters {
    next: HashMap<String, i64>,
}

impl RowCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id for `table`.
    pub fn next(&mut self, table: &str) -> i64 {
        let counter = self.next.entry(table.to_string()).or_insert(1);
        let id = *counter;
        *counter += 1;
        id
    }

    /// Rows handed out so far for `table`.
    pub fn count(&self, table: &str) -> i64 {
        self.next.get(table).map_or(0, |n| n - 1)
    }
}

/// One value destined for a column, tagged with the column's path key.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub key: String,
    pub name: String,
    pub column_type: ColumnType,
    pub value: SqlValue,
}

/// A row for one derived table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub table: String,
    pub id: i64,
    pub cells: Vec<Cell>,
}

impl Row {
    /// Value of the column named `name`.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.cells.iter().find(|c| c.name == name).map(|c| &c.value)
    }
}

/// Coerce a JSON value into a column of type `column_type`.
///
/// String columns take anything, serializing objects and arrays. Other
/// columns store NULL for values of the wrong shape.
pub fn coerce(value: &Value, column_type: ColumnType) -> SqlValue {
    match (column_type, value) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnType::Varchar, Value::String(s)) => SqlValue::Text(s.clone()),
        (ColumnType::Varchar, Value::Bool(b)) => SqlValue::Text(b.to_string()),
        (ColumnType::Varchar, Value::Number(n)) => SqlValue::Text(n.to_string()),
        (ColumnType::Varchar, nested) => SqlValue::Text(to_pretty_json(nested)),
        (ColumnType::Boolean, Value::Bool(b)) => SqlValue::Bool(*b),
        (ColumnType::Numeric, Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Float),
        },
        (ColumnType::Integer | ColumnType::BigInt, Value::Number(n)) => {
            n.as_i64().map_or(SqlValue::Null, SqlValue::Int)
        }
        (ColumnType::Uuid, Value::String(s)) if super::catalog::is_uuid(s) => {
            SqlValue::Text(s.clone())
        }
        _ => SqlValue::Null,
    }
}

/// Serialize with a 4-space indent.
pub fn to_pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

/// Walks documents against a catalog.
pub struct Materializer<'a> {
    catalog: &'a Catalog,
    root: &'a str,
    options: &'a TransformOptions,
    counters: RowCounters,
}

impl<'a> Materializer<'a> {
    pub fn new(catalog: &'a Catalog, root: &'a str, options: &'a TransformOptions) -> Self {
        Self {
            catalog,
            root,
            options,
            counters: RowCounters::new(),
        }
    }

    pub fn counters(&self) -> &RowCounters {
        &self.counters
    }

    /// Every row produced by one document, the root row first.
    pub fn document_rows(&mut self, doc: &Map<String, Value>) -> Vec<Row> {
        if self.options.max_depth == 0 {
            return Vec::new();
        }
        let root = TablePath::root(self.root);
        self.object_row(doc, &root, "", 1, &[])
    }

    /// One row for `obj` in its path's table, followed by its children.
    fn object_row(
        &mut self,
        obj: &Map<String, Value>,
        path: &TablePath,
        prefix: &str,
        depth: u32,
        quasikey: &[Cell],
    ) -> Vec<Row> {
        if depth > self.options.max_depth {
            return Vec::new();
        }
        let catalog = self.catalog;
        let Some(descriptor) = catalog.get(&path.table_name()) else {
            return Vec::new();
        };

        let mut cells: Vec<Cell> = quasikey.to_vec();
        let (own, children) = self.object_cells(obj, path, prefix, depth, quasikey);
        cells.extend(own);

        let mut rows = Vec::with_capacity(children.len() + 1);
        rows.push(self.finish_row(descriptor, cells));
        rows.extend(children);
        rows
    }

    /// Cells of `obj` flattened into its table, and rows of its child tables.
    fn object_cells(
        &mut self,
        obj: &Map<String, Value>,
        path: &TablePath,
        prefix: &str,
        depth: u32,
        quasikey: &[Cell],
    ) -> (Vec<Cell>, Vec<Row>) {
        let mut cells = Vec::new();
        let mut children = Vec::new();
        if depth > self.options.max_depth {
            return (cells, children);
        }
        let catalog = self.catalog;
        let Some(descriptor) = catalog.get(&path.table_name()) else {
            return (cells, children);
        };

        let mut qkey: Vec<Cell> = quasikey.to_vec();
        let mut objects = Vec::new();
        let mut arrays = Vec::new();
        for (k, v) in obj {
            let key = format!("{}{}", prefix, k);
            match v {
                Value::Object(inner) if depth < self.options.max_depth => {
                    objects.push((key.clone(), k, inner))
                }
                Value::Array(items) => arrays.push((key.clone(), k, items)),
                _ => {}
            }
            if let Some(attr) = descriptor.get(&key) {
                let cell = Cell {
                    key: attr.key.clone(),
                    name: attr.name.clone(),
                    column_type: attr.column_type,
                    value: coerce(v, attr.column_type),
                };
                push_cell(&mut qkey, cell.clone());
                cells.push(cell);
            }
        }

        for (key, k, inner) in objects {
            let (nested, rows) = self.object_cells(
                inner,
                &path.object(decode_camel_case(k)),
                &format!("{}__", decode_camel_case(&key)),
                depth + 1,
                &qkey,
            );
            cells.extend(nested);
            children.extend(rows);
        }
        for (key, k, items) in arrays {
            children.extend(self.array_rows(
                items,
                &path.array(decode_camel_case(k)),
                &format!("{}__", decode_camel_case(&key)),
                depth + 1,
                &key,
                &qkey,
            ));
        }
        (cells, children)
    }

    fn array_rows(
        &mut self,
        items: &[Value],
        path: &TablePath,
        prefix: &str,
        depth: u32,
        array_key: &str,
        quasikey: &[Cell],
    ) -> Vec<Row> {
        let mut rows = Vec::new();
        if depth > self.options.max_depth {
            return rows;
        }
        let catalog = self.catalog;
        let Some(descriptor) = catalog.get(&path.table_name()) else {
            return rows;
        };
        let ordinal_key = format!("{}o", prefix);

        for (i, item) in items.iter().enumerate() {
            let ordinal = Cell {
                key: ordinal_key.clone(),
                name: ordinal_key.clone(),
                column_type: ColumnType::Integer,
                value: SqlValue::Int(i as i64 + 1),
            };
            match item {
                Value::Null | Value::Array(_) => {}
                Value::Object(inner) => {
                    let mut qkey = quasikey.to_vec();
                    push_cell(&mut qkey, ordinal);
                    rows.extend(self.object_row(inner, path, prefix, depth, &qkey));
                }
                scalar => {
                    let Some(attr) = descriptor.get(array_key) else {
                        continue;
                    };
                    let mut cells = quasikey.to_vec();
                    cells.push(ordinal);
                    cells.push(Cell {
                        key: attr.key.clone(),
                        name: attr.name.clone(),
                        column_type: attr.column_type,
                        value: coerce(scalar, attr.column_type),
                    });
                    rows.push(self.finish_row(descriptor, cells));
                }
            }
        }
        rows
    }

    /// Keep the cells `descriptor` has columns for and number the row.
    fn finish_row(&mut self, descriptor: &TableDescriptor, cells: Vec<Cell>) -> Row {
        let mut kept: Vec<Cell> = Vec::with_capacity(cells.len());
        for cell in cells {
            let Some(attr) = descriptor.get(&cell.key) else {
                continue;
            };
            if kept.iter().any(|c| c.key == cell.key) {
                continue;
            }
            // The table's own column type decides, not the ancestor's.
            let column_type = attr.column_type;
            let value = if column_type == cell.column_type {
                cell.value
            } else {
                recoerce(cell.value, column_type)
            };
            kept.push(Cell {
                key: cell.key,
                name: attr.name.clone(),
                column_type,
                value,
            });
        }
        Row {
            table: descriptor.name().to_string(),
            id: self.counters.next(descriptor.name()),
            cells: kept,
        }
    }
}

/// Convert an already coerced value to another column type.
fn recoerce(value: SqlValue, column_type: ColumnType) -> SqlValue {
    match (column_type, value) {
        (_, SqlValue::Null) => SqlValue::Null,
        (ColumnType::Varchar, v @ SqlValue::Text(_)) => v,
        (ColumnType::Varchar, v) => SqlValue::Text(v.to_string()),
        (ColumnType::Boolean, v @ SqlValue::Bool(_)) => v,
        (ColumnType::Numeric, v @ (SqlValue::Int(_) | SqlValue::Float(_))) => v,
        (ColumnType::Integer | ColumnType::BigInt, v @ SqlValue::Int(_)) => v,
        (ColumnType::Uuid, SqlValue::Text(s)) if super::catalog::is_uuid(&s) => SqlValue::Text(s),
        _ => SqlValue::Null,
    }
}

fn push_cell(qkey: &mut Vec<Cell>, cell: Cell) {
    match qkey.iter_mut().find(|c| c.key == cell.key) {
        Some(existing) => *existing = cell,
        None => qkey.push(cell),
    }
}

/// Prepared INSERT text per table and column set.
#[derive(Debug, Default)]
struct InsertCache {
    statements: HashMap<(String, Vec<String>), String>,
}

impl InsertCache {
    fn statement(&mut self, db: &dyn Database, schema: Option<&str>, row: &Row) -> &str {
        let columns: Vec<String> = row.cells.iter().map(|c| c.name.clone()).collect();
        let dialect = db.dialect();
        self.statements
            .entry((row.table.clone(), columns))
            .or_insert_with(|| {
                let mut names = vec!["__id".to_string()];
                let mut values = vec![Operand::param(crate::sql::DataType::Int64)];
                for cell in &row.cells {
                    names.push(cell.name.clone());
                    values.push(Operand::param(cell.column_type.data_type()));
                }
                Insert::into(row.table.clone())
                    .maybe_schema(schema)
                    .columns(names)
                    .values(values)
                    .to_sql(dialect)
            })
    }
}

/// Re-scan the raw table and insert every derived row.
///
/// Returns the number of rows written per table, in catalog order.
pub fn materialize(
    db: &mut dyn Database,
    raw: &TableName,
    root: &str,
    catalog: &Catalog,
    options: &TransformOptions,
) -> TransformResult<Vec<(String, i64)>> {
    if options.max_depth == 0 || catalog.is_empty() {
        return Ok(Vec::new());
    }
    let schema = raw.schema();
    let mut materializer = Materializer::new(catalog, root, options);
    let mut cache = InsertCache::default();
    let mut cursor = RawCursor::new(db.dialect(), raw.clone(), options.batch_size);

    loop {
        let batch = cursor.next_batch(db)?;
        if batch.is_empty() {
            break;
        }
        for raw_doc in &batch {
            for row in materializer.document_rows(&raw_doc.doc) {
                let sql = cache.statement(db, schema, &row).to_string();
                let mut params = Vec::with_capacity(row.cells.len() + 1);
                params.push(SqlValue::Int(row.id));
                params.extend(row.cells.iter().map(|c| c.value.clone()));
                db.execute(&sql, &params)
                    .map_err(|e| TransformError::table(&row.table, e))?;
            }
        }
    }

    let counts: Vec<(String, i64)> = catalog
        .table_names()
        .map(|t| (t.to_string(), materializer.counters().count(t)))
        .collect();
    tracing::info!(
        rows = counts.iter().map(|(_, n)| n).sum::<i64>(),
        tables = counts.len(),
        "materialization complete"
    );
    Ok(counts)
}
