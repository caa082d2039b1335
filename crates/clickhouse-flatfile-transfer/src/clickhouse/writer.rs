//! Schema lookup and batched insert.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{quote_ident, quote_table, ClickHouseClient};
use crate::channel::{ChannelKind, RowSink};
use crate::error::{Result, TransferError};
use crate::schema::ColumnDescriptor;
use crate::value::{Value, TIMESTAMP_FORMAT};

/// Writes rows into a ClickHouse table as one batched insert.
///
/// Opening the sink describes the target table and maps each incoming
/// column name to its native type. Rows accumulate locally and the entire
/// batch goes out in a single `INSERT ... FORMAT JSONCompactEachRow` at
/// [`RowSink::finish`], so either every appended row is committed or none.
pub struct ClickHouseWriter<'a> {
    client: &'a ClickHouseClient,
    table: String,
    columns: Vec<ColumnDescriptor>,
    buffer: String,
    pending_rows: u64,
}

impl<'a> ClickHouseWriter<'a> {
    pub fn new(client: &'a ClickHouseClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            columns: Vec::new(),
            buffer: String::new(),
            pending_rows: 0,
        }
    }
}

#[async_trait]
impl RowSink for ClickHouseWriter<'_> {
    async fn open(&mut self, source_columns: &[ColumnDescriptor]) -> Result<Vec<ColumnDescriptor>> {
        let described = self.client.describe_table(&self.table).await?;
        let native_types: HashMap<&str, &str> = described
            .iter()
            .map(|(name, native)| (name.as_str(), native.as_str()))
            .collect();

        self.columns = source_columns
            .iter()
            .map(|src| {
                native_types
                    .get(src.name.as_str())
                    .map(|native| ColumnDescriptor::new(src.name.clone(), *native))
                    .ok_or_else(|| {
                        TransferError::Schema(format!(
                            "column {} not found in table {}",
                            src.name, self.table
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(table = %self.table, columns = self.columns.len(), "prepared batch insert");
        Ok(self.columns.clone())
    }

    async fn write_row(&mut self, row: Vec<Value>) -> Result<()> {
        let fields: Vec<serde_json::Value> = row.iter().map(value_to_json).collect();
        let line = serde_json::to_string(&fields)
            .map_err(|e| TransferError::Batch(format!("failed to serialize row: {e}")))?;
        self.buffer.push_str(&line);
        self.buffer.push('\n');
        self.pending_rows += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.pending_rows == 0 {
            debug!(table = %self.table, "no rows appended, skipping batch send");
            return Ok(());
        }

        let column_list = self
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) FORMAT JSONCompactEachRow",
            quote_table(&self.table),
            column_list
        );

        self.client
            .run(&statement, Some(std::mem::take(&mut self.buffer)))
            .await
            .map_err(TransferError::Batch)?;

        info!(table = %self.table, rows = self.pending_rows, "batch committed");
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Database
    }
}

/// Render a typed value as a `JSONCompactEachRow` field.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int(v) => serde_json::Value::from(*v),
        Value::UInt(v) => serde_json::Value::from(*v),
        // NaN and infinities have no JSON representation.
        Value::Float(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(v) => serde_json::Value::from(v.as_str()),
        Value::Timestamp(ts) => {
            serde_json::Value::from(ts.format(TIMESTAMP_FORMAT).to_string())
        }
    }
}
