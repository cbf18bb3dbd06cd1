//! Schema inference: the first pass over the raw table.
//!
//! Each document is walked up to the configured depth and yields a
//! [`Catalog`] fragment. Fragments fold into the run's catalog with
//! first-wins semantics, so a column keeps the type of the first value seen
//! for it.

use serde_json::{Map, Value};

use super::camel::decode_camel_case;
use super::catalog::{Attr, Catalog, ColumnType};
use super::path::TablePath;
use super::{TransformError, TransformOptions, TransformResult};
use crate::db::{ignore_idempotent, Database, RawCursor, TableName};
use crate::sql::DropTable;

/// Infer the tables and columns of one document.
///
/// `root` is the unqualified root table name (`<base>__t`).
pub fn infer_document(doc: &Map<String, Value>, root: &str, options: &TransformOptions) -> Catalog {
    let mut catalog = Catalog::new();
    if options.max_depth == 0 {
        return catalog;
    }
    catalog.table_mut(root);
    catalog.merge(infer_object(doc, &TablePath::root(root), "", 1, &[], options));
    catalog
}

fn infer_object(
    obj: &Map<String, Value>,
    path: &TablePath,
    prefix: &str,
    depth: u32,
    quasikey: &[Attr],
    options: &TransformOptions,
) -> Catalog {
    let mut catalog = Catalog::new();
    if depth > options.max_depth {
        return catalog;
    }
    let table = path.table_name();
    let mut qkey: Vec<Attr> = quasikey.iter().map(Attr::as_ancestor_key).collect();
    let mut objects = Vec::new();
    let mut arrays = Vec::new();

    let descriptor = catalog.table_mut(&table);
    for (k, v) in obj {
        let key = format!("{}{}", prefix, k);
        match v {
            Value::Null => {}
            Value::Object(_) if depth == options.max_depth => {
                descriptor.insert(
                    Attr::leaf(&key, decode_camel_case(&key), ColumnType::Varchar).with_sample(v),
                );
            }
            Value::Object(inner) => objects.push((key, k, inner)),
            Value::Array(items) => arrays.push((key, k, items)),
            scalar => {
                let Some(column_type) = ColumnType::of_scalar(scalar, options.native_uuid) else {
                    continue;
                };
                let attr = Attr::leaf(&key, decode_camel_case(&key), column_type).with_sample(scalar);
                push_key(&mut qkey, attr.as_ancestor_key());
                descriptor.insert(attr);
            }
        }
    }

    for (key, k, inner) in objects {
        let nested = infer_object(
            inner,
            &path.object(decode_camel_case(k)),
            &format!("{}__", decode_camel_case(&key)),
            depth + 1,
            &qkey,
            options,
        );
        catalog.merge(nested);
    }
    for (key, k, items) in arrays {
        let child = infer_array(
            items,
            &path.array(decode_camel_case(k)),
            &format!("{}__", decode_camel_case(&key)),
            depth + 1,
            &key,
            &qkey,
            options,
        );
        catalog.merge(child);
    }
    catalog
}

fn infer_array(
    items: &[Value],
    path: &TablePath,
    prefix: &str,
    depth: u32,
    array_key: &str,
    quasikey: &[Attr],
    options: &TransformOptions,
) -> Catalog {
    let mut catalog = Catalog::new();
    if depth > options.max_depth {
        return catalog;
    }
    let table = path.table_name();
    let ordinal = Attr::array_ordinal(format!("{}o", prefix));

    let descriptor = catalog.table_mut(&table);
    for attr in quasikey {
        descriptor.insert(attr.as_ancestor_key());
    }
    descriptor.insert(ordinal.clone());

    let mut qkey: Vec<Attr> = quasikey.to_vec();
    push_key(&mut qkey, ordinal);

    for item in items {
        match item {
            Value::Object(inner) => {
                let element = infer_object(inner, path, prefix, depth, &qkey, options);
                catalog.merge(element);
            }
            // Nested arrays and nulls carry nothing.
            Value::Array(_) | Value::Null => {}
            scalar => {
                if let Some(column_type) = ColumnType::of_element(scalar) {
                    catalog.table_mut(&table).insert(
                        Attr::leaf(array_key, decode_camel_case(array_key), column_type)
                            .with_sample(scalar),
                    );
                }
            }
        }
    }
    catalog
}

/// Add or replace a quasi-key column by key.
fn push_key(qkey: &mut Vec<Attr>, attr: Attr) {
    match qkey.iter_mut().find(|a| a.key == attr.key) {
        Some(existing) => *existing = attr,
        None => qkey.push(attr),
    }
}

/// Scan every raw document and build the run's catalog.
pub fn scan(
    db: &mut dyn Database,
    raw: &TableName,
    root: &str,
    options: &TransformOptions,
) -> TransformResult<Catalog> {
    let mut catalog = Catalog::new();
    if options.max_depth == 0 {
        return Ok(catalog);
    }
    let mut cursor = RawCursor::new(db.dialect(), raw.clone(), options.batch_size);
    let mut scanned = 0u64;
    loop {
        let batch = cursor.next_batch(db)?;
        if batch.is_empty() {
            break;
        }
        for raw_doc in &batch {
            catalog.merge(infer_document(&raw_doc.doc, root, options));
        }
        scanned += batch.len() as u64;
        tracing::debug!(scanned, "scanned raw batch");
    }
    tracing::info!(
        documents = scanned,
        skipped = cursor.skipped(),
        tables = catalog.len(),
        "schema inference complete"
    );
    Ok(catalog)
}

/// Drop and re-create every table of `catalog` in `schema`.
pub fn create_tables(
    db: &mut dyn Database,
    schema: Option<&str>,
    catalog: &Catalog,
) -> TransformResult<()> {
    let dialect = db.dialect();
    for table in catalog.tables() {
        let drop = DropTable::new(table.name())
            .maybe_schema(schema)
            .if_exists()
            .to_sql(dialect);
        ignore_idempotent(db.execute_ddl(&drop)).map_err(|e| TransformError::table(table.name(), e))?;

        let create = table.create_table(schema).to_sql(dialect);
        tracing::debug!(sql = %create, "creating derived table");
        db.execute_ddl(&create)
            .map_err(|e| TransformError::table(table.name(), e))?;
    }
    Ok(())
}
