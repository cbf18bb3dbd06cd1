//! Table and column descriptors produced by the inference pass.

use std::collections::HashMap;

use serde_json::Value;

use crate::sql::{ColumnDef, CreateTable, DataType};

/// Type of a derived column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Varchar,
    Integer,
    BigInt,
    Numeric,
    Boolean,
    Uuid,
}

impl ColumnType {
    /// Type of a scalar object field.
    ///
    /// Returns `None` for nulls, objects and arrays.
    pub fn of_scalar(value: &Value, native_uuid: bool) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(_) => Some(ColumnType::Numeric),
            Value::String(s) if native_uuid && is_uuid(s) => Some(ColumnType::Uuid),
            Value::String(_) => Some(ColumnType::Varchar),
            Value::Null | Value::Object(_) | Value::Array(_) => None,
        }
    }

    /// Type of a scalar array element. UUIDs are not detected here.
    pub fn of_element(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(_) => Some(ColumnType::Numeric),
            Value::String(_) => Some(ColumnType::Varchar),
            Value::Null | Value::Object(_) | Value::Array(_) => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Varchar => DataType::String,
            ColumnType::Integer => DataType::Int32,
            ColumnType::BigInt => DataType::Int64,
            ColumnType::Numeric => DataType::Numeric,
            ColumnType::Boolean => DataType::Bool,
            ColumnType::Uuid => DataType::Uuid,
        }
    }
}

/// Whether `s` is a UUID in canonical or braced/simple form.
pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// Position class of a column. Generated DDL orders columns by class,
/// then by first appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrdinalClass {
    /// Inherited from an ancestor row.
    AncestorKey = 1,
    /// 1-based position in the parent array.
    ArrayOrdinal = 2,
    /// The table's own data.
    Leaf = 3,
}

/// A column of a derived table.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    /// Path key in the document, e.g. `metadata__createdDate`.
    pub key: String,
    /// Decoded SQL column name, e.g. `metadata__created_date`.
    pub name: String,
    pub column_type: ColumnType,
    pub ordinal: OrdinalClass,
    /// First value seen for the column, if any.
    pub sample: Option<Value>,
}

impl Attr {
    pub fn leaf(key: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            column_type,
            ordinal: OrdinalClass::Leaf,
            sample: None,
        }
    }

    /// The ordinal column of an array table. Its key and name are the same.
    pub fn array_ordinal(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            column_type: ColumnType::Integer,
            ordinal: OrdinalClass::ArrayOrdinal,
            sample: None,
        }
    }

    pub fn with_sample(mut self, sample: &Value) -> Self {
        self.sample = Some(sample.clone());
        self
    }

    /// This column as inherited by a descendant table.
    pub fn as_ancestor_key(&self) -> Self {
        Self {
            ordinal: OrdinalClass::AncestorKey,
            sample: None,
            ..self.clone()
        }
    }

    /// Whether the column is worth indexing for joins back to ancestors.
    pub fn is_join_key(&self) -> bool {
        self.ordinal != OrdinalClass::Leaf
    }
}

/// Columns of one derived table, keyed by path key in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDescriptor {
    name: String,
    attrs: Vec<Attr>,
    by_key: HashMap<String, usize>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Unqualified table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a column unless its key is already present. The first shape seen
    /// for a key wins. Returns whether the column was added.
    pub fn insert(&mut self, attr: Attr) -> bool {
        if self.by_key.contains_key(&attr.key) {
            return false;
        }
        self.by_key.insert(attr.key.clone(), self.attrs.len());
        self.attrs.push(attr);
        true
    }

    pub fn get(&self, key: &str) -> Option<&Attr> {
        self.by_key.get(key).map(|&i| &self.attrs[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Columns in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter()
    }

    /// Columns in DDL order: ancestor keys, then the ordinal, then leaves.
    pub fn ordered(&self) -> Vec<&Attr> {
        let mut ordered: Vec<&Attr> = self.attrs.iter().collect();
        // Stable, so first-seen order holds within a class.
        ordered.sort_by_key(|a| a.ordinal);
        ordered
    }

    /// Columns that link rows back to their ancestors.
    pub fn join_keys(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter().filter(|a| a.is_join_key())
    }

    /// `CREATE TABLE` with the leading `__id` key and columns in DDL order.
    pub fn create_table(&self, schema: Option<&str>) -> CreateTable {
        let columns = self
            .ordered()
            .into_iter()
            .map(|a| ColumnDef::new(a.name.clone(), a.column_type.data_type()));
        CreateTable::new(self.name.clone())
            .maybe_schema(schema)
            .column(ColumnDef::new("__id", DataType::Int64))
            .columns(columns)
    }

    fn merge(&mut self, other: TableDescriptor) {
        for attr in other.attrs {
            self.insert(attr);
        }
    }
}

/// Every derived table of a run, in first-seen order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    tables: Vec<TableDescriptor>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table named `name`, created empty on first use.
    pub fn table_mut(&mut self, name: &str) -> &mut TableDescriptor {
        let index = match self.by_name.get(name) {
            Some(&i) => i,
            None => {
                self.by_name.insert(name.to_string(), self.tables.len());
                self.tables.push(TableDescriptor::new(name));
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    pub fn get(&self, name: &str) -> Option<&TableDescriptor> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    /// Fold `other` into this catalog. Tables and columns already present
    /// keep their existing definition.
    pub fn merge(&mut self, other: Catalog) {
        for table in other.tables {
            let name = table.name.clone();
            self.table_mut(&name).merge(table);
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name())
    }
}
