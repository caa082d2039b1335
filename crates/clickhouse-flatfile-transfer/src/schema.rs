//! Column descriptors and schema discovery.
//!
//! Descriptors are derived once per transfer and stay immutable for its
//! duration: from `DESCRIBE TABLE` for file-to-database transfers, from the
//! result-set metadata for database-to-file transfers, or inferred from a
//! flat file's header plus its first data row when no authoritative schema
//! exists (best-effort only).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::channel::RowSource;
use crate::clickhouse::ClickHouseClient;
use crate::error::Result;
use crate::flatfile::FlatFileReader;
use crate::typemap::{classify, LogicalType};
use crate::value::{Value, TIMESTAMP_FORMAT};

/// A named column with its native type name and classified logical type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Native ClickHouse type name (e.g. "UInt64", "Nullable(String)").
    pub native_type: String,

    /// Logical type the native type classifies into.
    pub logical_type: LogicalType,
}

impl ColumnDescriptor {
    /// Create a descriptor, classifying the native type name.
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        let native_type = native_type.into();
        let logical_type = classify(&native_type);
        Self {
            name: name.into(),
            native_type,
            logical_type,
        }
    }
}

/// A table and its columns, as reported by schema discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

/// List tables and columns of the client's current database.
///
/// One query over `system.columns`, grouped by table in position order.
pub async fn list_tables(client: &ClickHouseClient) -> Result<Vec<TableSchema>> {
    let rows = client
        .query_text_rows(
            "SELECT table, name, type FROM system.columns \
             WHERE database = currentDatabase() ORDER BY table, position",
        )
        .await?;

    let mut tables: Vec<TableSchema> = Vec::new();
    for row in rows {
        let [table, name, native_type] = match &row[..] {
            [t, n, ty, ..] => [t, n, ty],
            _ => {
                return Err(crate::error::TransferError::Query(
                    "unexpected system.columns row shape".into(),
                ))
            }
        };
        let column = ColumnDescriptor::new(name.clone(), native_type.clone());
        match tables.last_mut() {
            Some(last) if &last.name == table => last.columns.push(column),
            _ => tables.push(TableSchema {
                name: table.clone(),
                columns: vec![column],
            }),
        }
    }
    Ok(tables)
}

/// Infer a flat file's schema from its header and first data row.
///
/// Best-effort: values that parse as integers become `Int64`, as floats
/// `Float64`, as `YYYY-MM-DD HH:MM:SS` timestamps `DateTime`; everything
/// else (including empty fields and a file with no data rows) is `String`.
pub async fn infer_flat_file_schema(path: &Path, delimiter: char) -> Result<Vec<ColumnDescriptor>> {
    let mut reader = FlatFileReader::new(path, delimiter);
    let header = reader.open().await?;
    let first_row = reader.next_row().await?;

    let columns = header
        .into_iter()
        .enumerate()
        .map(|(i, col)| {
            let sample = first_row.as_ref().and_then(|row| row.get(i));
            ColumnDescriptor::new(col.name, infer_native_type(sample))
        })
        .collect();
    Ok(columns)
}

fn infer_native_type(sample: Option<&Value>) -> &'static str {
    let raw = match sample {
        Some(Value::Text(s)) if !s.is_empty() => s,
        _ => return "String",
    };

    if raw.parse::<i64>().is_ok() {
        "Int64"
    } else if raw.parse::<f64>().is_ok() {
        "Float64"
    } else if chrono::NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).is_ok() {
        "DateTime"
    } else {
        "String"
    }
}
