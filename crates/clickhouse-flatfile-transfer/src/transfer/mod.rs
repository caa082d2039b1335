//! The transfer engine: one directional, single-pass movement of rows from
//! a source channel to a destination channel with per-column conversion.
//!
//! Rows are read, converted, and written strictly one at a time, in source
//! order. The engine either exhausts the source and finalizes the
//! destination, or terminates at the first error, returning the count of
//! rows fully processed before the failure. There is no retry: any error is
//! terminal for the invocation and the caller may re-run from scratch.

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::channel::{ChannelKind, RowSink, RowSource};
use crate::clickhouse::{ClickHouseClient, ClickHouseReader, ClickHouseWriter};
use crate::error::{Result, TransferError};
use crate::flatfile::{FlatFileReader, FlatFileWriter};
use crate::schema::ColumnDescriptor;
use crate::value::{convert_row, encode};

/// Outcome of one transfer invocation.
///
/// `record_count` is incremented once per successfully written row and is
/// preserved even when the transfer fails partway.
#[derive(Debug)]
pub struct TransferResult {
    /// Rows fully processed (converted and written).
    pub record_count: u64,

    /// The error that terminated the transfer, if any.
    pub error: Option<TransferError>,
}

impl TransferResult {
    /// Whether the source was exhausted and the destination finalized.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Orchestrates one directional transfer between two channels.
pub struct TransferEngine<S, D> {
    source: S,
    sink: D,
}

impl<S: RowSource, D: RowSink> TransferEngine<S, D> {
    /// Pair a source with a destination. Any combination is accepted here;
    /// file-to-file is rejected when the transfer runs.
    pub fn new(source: S, sink: D) -> Self {
        Self { source, sink }
    }

    /// Run the transfer to completion or first error.
    pub async fn run(mut self) -> TransferResult {
        let mut record_count = 0;
        match self.drive(&mut record_count).await {
            Ok(()) => {
                info!(rows = record_count, "transfer completed");
                TransferResult {
                    record_count,
                    error: None,
                }
            }
            Err(error) => {
                warn!(rows = record_count, %error, "transfer failed");
                TransferResult {
                    record_count,
                    error: Some(error),
                }
            }
        }
    }

    async fn drive(&mut self, record_count: &mut u64) -> Result<()> {
        if self.source.kind() == ChannelKind::FlatFile && self.sink.kind() == ChannelKind::FlatFile
        {
            return Err(TransferError::Config(
                "file-to-file transfers are not supported".into(),
            ));
        }

        let source_columns = self.source.open().await?;
        let dest_columns = self.sink.open(&source_columns).await?;

        while let Some(row) = self.source.next_row().await? {
            let converted = convert_row(row, &dest_columns, *record_count + 1)?;
            self.sink.write_row(converted).await?;
            *record_count += 1;
        }

        self.sink.finish().await
    }
}

/// Execute a query and write the result to a delimited flat file.
pub async fn transfer_database_to_file(
    client: &ClickHouseClient,
    query: &str,
    destination: &Path,
    delimiter: char,
) -> TransferResult {
    let source = ClickHouseReader::new(client, query);
    let sink = FlatFileWriter::new(destination, delimiter);
    TransferEngine::new(source, sink).run().await
}

/// Read a delimited flat file and insert its rows into a table.
pub async fn transfer_file_to_database(
    client: &ClickHouseClient,
    source_path: &Path,
    delimiter: char,
    table: &str,
) -> TransferResult {
    let source = FlatFileReader::new(source_path, delimiter);
    let sink = ClickHouseWriter::new(client, table);
    TransferEngine::new(source, sink).run().await
}

/// The first rows of a source, re-encoded to display text.
#[derive(Debug, Serialize)]
pub struct Preview {
    /// Source column descriptors.
    pub columns: Vec<ColumnDescriptor>,

    /// Up to `limit` rows in source order.
    pub rows: Vec<Vec<String>>,
}

/// Read up to `limit` rows from a source without writing anywhere.
///
/// Applies the same decoding rules as a transfer; there is no writer side.
pub async fn preview_rows<S: RowSource>(mut source: S, limit: usize) -> Result<Preview> {
    let columns = source.open().await?;
    let mut rows = Vec::new();
    while rows.len() < limit {
        match source.next_row().await? {
            Some(row) => rows.push(row.iter().map(encode).collect()),
            None => break,
        }
    }
    Ok(Preview { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    struct MockSource {
        columns: Vec<ColumnDescriptor>,
        rows: VecDeque<Vec<Value>>,
    }

    impl MockSource {
        fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Value>>) -> Self {
            Self {
                columns,
                rows: rows.into(),
            }
        }
    }

    #[async_trait]
    impl RowSource for MockSource {
        async fn open(&mut self) -> crate::error::Result<Vec<ColumnDescriptor>> {
            Ok(self.columns.clone())
        }

        async fn next_row(&mut self) -> crate::error::Result<Option<Vec<Value>>> {
            Ok(self.rows.pop_front())
        }

        fn kind(&self) -> ChannelKind {
            ChannelKind::Database
        }
    }

    #[derive(Default)]
    struct SinkState {
        written: Vec<Vec<Value>>,
        finished: bool,
    }

    struct MockSink {
        columns: Vec<ColumnDescriptor>,
        state: Arc<Mutex<SinkState>>,
        fail_write_at: Option<usize>,
        fail_finish: bool,
    }

    impl MockSink {
        fn new(columns: Vec<ColumnDescriptor>) -> (Self, Arc<Mutex<SinkState>>) {
            let state = Arc::new(Mutex::new(SinkState::default()));
            (
                Self {
                    columns,
                    state: state.clone(),
                    fail_write_at: None,
                    fail_finish: false,
                },
                state,
            )
        }
    }

    #[async_trait]
    impl RowSink for MockSink {
        async fn open(
            &mut self,
            _source_columns: &[ColumnDescriptor],
        ) -> crate::error::Result<Vec<ColumnDescriptor>> {
            Ok(self.columns.clone())
        }

        async fn write_row(&mut self, row: Vec<Value>) -> crate::error::Result<()> {
            let mut state = self.state.lock().unwrap();
            if Some(state.written.len() + 1) == self.fail_write_at {
                return Err(TransferError::Batch("write rejected".into()));
            }
            state.written.push(row);
            Ok(())
        }

        async fn finish(&mut self) -> crate::error::Result<()> {
            if self.fail_finish {
                return Err(TransferError::Batch("batch rejected by destination".into()));
            }
            self.state.lock().unwrap().finished = true;
            Ok(())
        }

        fn kind(&self) -> ChannelKind {
            ChannelKind::Database
        }
    }

    fn col(name: &str, native: &str) -> ColumnDescriptor {
        ColumnDescriptor::new(name, native)
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, crate::value::TIMESTAMP_FORMAT).unwrap()
    }

    #[tokio::test]
    async fn test_file_to_file_is_rejected() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        writeln!(input, "a,b\n1,2").unwrap();
        input.flush().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let source = FlatFileReader::new(input.path(), ',');
        let sink = FlatFileWriter::new(dir.path().join("out.csv"), ',');
        let result = TransferEngine::new(source, sink).run().await;

        assert_eq!(result.record_count, 0);
        assert!(matches!(result.error, Some(TransferError::Config(_))));
    }

    #[tokio::test]
    async fn test_file_to_database_with_empty_field() {
        // Header id,amount,created; the second row's amount is empty and
        // must land as 0.0, not null and not an error.
        let mut input = tempfile::NamedTempFile::new().unwrap();
        write!(
            input,
            "id,amount,created\n1,10.5,2024-01-01 00:00:00\n2,,2024-01-02 00:00:00\n"
        )
        .unwrap();
        input.flush().unwrap();

        let source = FlatFileReader::new(input.path(), ',');
        let (sink, state) = MockSink::new(vec![
            col("id", "Int64"),
            col("amount", "Float64"),
            col("created", "DateTime"),
        ]);
        let result = TransferEngine::new(source, sink).run().await;

        assert!(result.is_success(), "unexpected error: {:?}", result.error);
        assert_eq!(result.record_count, 2);

        let state = state.lock().unwrap();
        assert!(state.finished);
        assert_eq!(
            state.written[0],
            vec![
                Value::Int(1),
                Value::Float(10.5),
                Value::Timestamp(ts("2024-01-01 00:00:00"))
            ]
        );
        assert_eq!(
            state.written[1],
            vec![
                Value::Int(2),
                Value::Float(0.0),
                Value::Timestamp(ts("2024-01-02 00:00:00"))
            ]
        );
    }

    #[tokio::test]
    async fn test_database_to_file_with_delimiter() {
        let source = MockSource::new(
            vec![col("name", "String"), col("score", "Float64")],
            vec![
                vec![Value::Text("alice".into()), Value::Float(1.5)],
                vec![Value::Text("bob".into()), Value::Float(2.0)],
                vec![Value::Text("carol".into()), Value::Float(3.25)],
            ],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        let sink = FlatFileWriter::new(&path, ';');
        let result = TransferEngine::new(source, sink).run().await;

        assert!(result.is_success());
        assert_eq!(result.record_count, 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "name;score\nalice;1.5\nbob;2\ncarol;3.25\n");
    }

    #[tokio::test]
    async fn test_partial_count_on_conversion_failure() {
        // Row 3 of 5 cannot be parsed into the destination type; the count
        // must stop at 2 and nothing past row 3 may reach the sink.
        let rows: Vec<Vec<Value>> = vec![
            vec![Value::Text("1".into())],
            vec![Value::Text("2".into())],
            vec![Value::Text("boom".into())],
            vec![Value::Text("4".into())],
            vec![Value::Text("5".into())],
        ];
        let source = MockSource::new(vec![col("id", "String")], rows);
        let (sink, state) = MockSink::new(vec![col("id", "Int64")]);

        let result = TransferEngine::new(source, sink).run().await;

        assert_eq!(result.record_count, 2);
        match result.error {
            Some(TransferError::Conversion { column, row, value, .. }) => {
                assert_eq!(column, "id");
                assert_eq!(row, 3);
                assert_eq!(value, "boom");
            }
            other => panic!("expected Conversion, got {other:?}"),
        }

        let state = state.lock().unwrap();
        assert_eq!(state.written.len(), 2);
        assert!(!state.finished);
    }

    #[tokio::test]
    async fn test_partial_count_on_write_failure() {
        let rows: Vec<Vec<Value>> = (1..=4).map(|i| vec![Value::Int(i)]).collect();
        let source = MockSource::new(vec![col("id", "Int64")], rows);
        let (mut sink, state) = MockSink::new(vec![col("id", "Int64")]);
        sink.fail_write_at = Some(3);

        let result = TransferEngine::new(source, sink).run().await;

        assert_eq!(result.record_count, 2);
        assert!(matches!(result.error, Some(TransferError::Batch(_))));
        assert_eq!(state.lock().unwrap().written.len(), 2);
    }

    #[tokio::test]
    async fn test_finish_failure_reports_batch_error() {
        let source = MockSource::new(vec![col("id", "Int64")], vec![vec![Value::Int(1)]]);
        let (mut sink, state) = MockSink::new(vec![col("id", "Int64")]);
        sink.fail_finish = true;

        let result = TransferEngine::new(source, sink).run().await;

        // The row was written but the batch send was rejected.
        assert_eq!(result.record_count, 1);
        assert!(matches!(result.error, Some(TransferError::Batch(_))));
        assert!(!state.lock().unwrap().finished);
    }

    #[tokio::test]
    async fn test_preview_respects_limit_and_encodes() {
        let source = MockSource::new(
            vec![col("id", "UInt64"), col("seen", "DateTime")],
            vec![
                vec![Value::UInt(1), Value::Timestamp(ts("2024-01-01 12:00:00"))],
                vec![Value::UInt(2), Value::Timestamp(ts("2024-01-02 12:00:00"))],
                vec![Value::UInt(3), Value::Timestamp(ts("2024-01-03 12:00:00"))],
            ],
        );

        let preview = preview_rows(source, 2).await.unwrap();
        assert_eq!(preview.columns.len(), 2);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[0], vec!["1", "2024-01-01 12:00:00"]);
    }

    #[tokio::test]
    async fn test_preview_of_flat_file() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        write!(input, "a,b\nx,y\n").unwrap();
        input.flush().unwrap();

        let preview = preview_rows(FlatFileReader::new(input.path(), ','), 10)
            .await
            .unwrap();
        assert_eq!(preview.rows, vec![vec!["x".to_string(), "y".to_string()]]);
    }
}
