//! Query execution and lazy result iteration.

use async_trait::async_trait;
use tracing::debug;

use super::{scan_value, ClickHouseClient, JsonLineStream};
use crate::channel::{ChannelKind, RowSource};
use crate::error::{Result, TransferError};
use crate::schema::ColumnDescriptor;
use crate::value::Value;

/// Reads rows from a ClickHouse query result.
///
/// The query runs once in [`RowSource::open`]; column names and native type
/// names come from the result metadata, and rows stream off the response
/// body one at a time.
pub struct ClickHouseReader<'a> {
    client: &'a ClickHouseClient,
    query: String,
    columns: Vec<ColumnDescriptor>,
    stream: Option<JsonLineStream>,
    row_number: u64,
}

impl<'a> ClickHouseReader<'a> {
    pub fn new(client: &'a ClickHouseClient, query: impl Into<String>) -> Self {
        Self {
            client,
            query: query.into(),
            columns: Vec::new(),
            stream: None,
            row_number: 0,
        }
    }
}

#[async_trait]
impl RowSource for ClickHouseReader<'_> {
    async fn open(&mut self) -> Result<Vec<ColumnDescriptor>> {
        let statement = format!(
            "{} FORMAT JSONCompactEachRowWithNamesAndTypes",
            self.query.trim().trim_end_matches(';')
        );
        let response = self
            .client
            .run(&statement, None)
            .await
            .map_err(TransferError::Query)?;
        let mut stream = JsonLineStream::from_response(response);

        let names = header_line(&mut stream, "names").await?;
        let types = header_line(&mut stream, "types").await?;
        if names.len() != types.len() {
            return Err(TransferError::Query(format!(
                "result metadata mismatch: {} names, {} types",
                names.len(),
                types.len()
            )));
        }

        self.columns = names
            .into_iter()
            .zip(types)
            .map(|(name, native_type)| ColumnDescriptor::new(name, native_type))
            .collect();
        self.stream = Some(stream);
        self.row_number = 0;

        debug!(columns = self.columns.len(), "query executed");
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransferError::Config("database reader not opened".into()))?;

        let Some(line) = stream.next_line().await? else {
            return Ok(None);
        };
        if line.is_empty() {
            return Ok(None);
        }
        self.row_number += 1;

        let fields: Vec<serde_json::Value> = serde_json::from_str(&line).map_err(|e| {
            TransferError::Query(format!("malformed result row {}: {e}", self.row_number))
        })?;
        if fields.len() != self.columns.len() {
            return Err(TransferError::Query(format!(
                "result row {} has {} fields, expected {}",
                self.row_number,
                fields.len(),
                self.columns.len()
            )));
        }

        fields
            .iter()
            .zip(&self.columns)
            .map(|(field, column)| scan_value(field, column, self.row_number))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Database
    }
}

async fn header_line(stream: &mut JsonLineStream, what: &str) -> Result<Vec<String>> {
    let line = stream
        .next_line()
        .await?
        .ok_or_else(|| TransferError::Query(format!("result stream missing {what} header")))?;
    serde_json::from_str(&line)
        .map_err(|e| TransferError::Query(format!("malformed {what} header: {e}")))
}
