//! Row-oriented reader/writer over a delimited text format.
//!
//! UTF-8 text, one `\n`-terminated record per line, first line is the header,
//! fields separated by a single configurable delimiter (default `,`). No
//! quoting or escaping is defined: a field containing the delimiter corrupts
//! column alignment on read. Known format limitation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tracing::debug;

use crate::channel::{ChannelKind, RowSink, RowSource};
use crate::error::{Result, TransferError};
use crate::schema::ColumnDescriptor;
use crate::value::{encode, Value};

/// Default field delimiter.
pub const DEFAULT_DELIMITER: char = ',';

/// Reads header and rows from a delimited flat file.
///
/// The sequence is lazy and restartable from disk, not resumable mid-stream:
/// re-opening starts over from the header.
pub struct FlatFileReader {
    path: PathBuf,
    delimiter: char,
    lines: Option<Lines<BufReader<File>>>,
    columns: Vec<ColumnDescriptor>,
    /// 1-based data line counter (header excluded).
    line_number: u64,
}

impl FlatFileReader {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            path: path.into(),
            delimiter,
            lines: None,
            columns: Vec::new(),
            line_number: 0,
        }
    }

    fn split(&self, line: &str) -> Vec<String> {
        line.split(self.delimiter).map(str::to_string).collect()
    }
}

#[async_trait]
impl RowSource for FlatFileReader {
    async fn open(&mut self) -> Result<Vec<ColumnDescriptor>> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();

        // An empty file has no header line to align fields against.
        let header = lines.next_line().await?.ok_or(TransferError::Format {
            line: 1,
            expected: 1,
            found: 0,
        })?;

        self.columns = self
            .split(&header)
            .into_iter()
            .map(|name| ColumnDescriptor::new(name, "String"))
            .collect();
        self.lines = Some(lines);
        self.line_number = 0;

        debug!(path = %self.path.display(), columns = self.columns.len(), "opened flat file");
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| TransferError::Config("flat file reader not opened".into()))?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        self.line_number += 1;

        let fields = self.split(&line);
        if fields.len() != self.columns.len() {
            return Err(TransferError::Format {
                line: self.line_number,
                expected: self.columns.len(),
                found: fields.len(),
            });
        }

        Ok(Some(fields.into_iter().map(Value::Text).collect()))
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::FlatFile
    }
}

/// Writes a header and rows to a delimited flat file.
///
/// Creates or truncates the file on open. Writes are buffered; nothing is
/// durable until [`RowSink::finish`] flushes. Directory creation for the
/// destination path is the caller's responsibility.
pub struct FlatFileWriter {
    path: PathBuf,
    delimiter: char,
    writer: Option<BufWriter<File>>,
    columns: Vec<ColumnDescriptor>,
}

impl FlatFileWriter {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            path: path.into(),
            delimiter,
            writer: None,
            columns: Vec::new(),
        }
    }

    /// The destination path this writer targets.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&mut self, fields: &[String]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransferError::Config("flat file writer not opened".into()))?;

        let mut line = fields.join(&self.delimiter.to_string());
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl RowSink for FlatFileWriter {
    async fn open(&mut self, source_columns: &[ColumnDescriptor]) -> Result<Vec<ColumnDescriptor>> {
        let file = File::create(&self.path).await?;
        self.writer = Some(BufWriter::new(file));

        // The file side has no native types: every destination column is text.
        self.columns = source_columns
            .iter()
            .map(|col| ColumnDescriptor::new(col.name.clone(), "String"))
            .collect();

        let header: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        self.write_line(&header).await?;

        debug!(path = %self.path.display(), columns = header.len(), "created output file");
        Ok(self.columns.clone())
    }

    async fn write_row(&mut self, row: Vec<Value>) -> Result<()> {
        let fields: Vec<String> = row.iter().map(encode).collect();
        self.write_line(&fields).await
    }

    async fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::FlatFile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_read_header_and_rows() {
        let file = fixture("id,name\n1,alpha\n2,beta\n");
        let mut reader = FlatFileReader::new(file.path(), ',');

        let cols = reader.open().await.unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "id");

        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row, vec![Value::Text("1".into()), Value::Text("alpha".into())]);
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row[1], Value::Text("beta".into()));
        assert!(reader.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_field_count_mismatch_is_format_error() {
        let file = fixture("a,b,c\n1,2,3\n4,5\n");
        let mut reader = FlatFileReader::new(file.path(), ',');
        reader.open().await.unwrap();
        reader.next_row().await.unwrap();

        let err = reader.next_row().await.unwrap_err();
        match err {
            TransferError::Format { line, expected, found } => {
                assert_eq!(line, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected Format, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let mut reader = FlatFileReader::new("/nonexistent/path.csv", ',');
        assert!(matches!(
            reader.open().await.unwrap_err(),
            TransferError::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut writer = FlatFileWriter::new(&path, ';');
        let cols = vec![
            ColumnDescriptor::new("name", "String"),
            ColumnDescriptor::new("score", "Float64"),
        ];
        writer.open(&cols).await.unwrap();
        writer
            .write_row(vec![Value::Text("a".into()), Value::Text("1.5".into())])
            .await
            .unwrap();
        writer
            .write_row(vec![Value::Text("b".into()), Value::Text("2".into())])
            .await
            .unwrap();
        writer.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "name;score\na;1.5\nb;2\n");

        let mut reader = FlatFileReader::new(&path, ';');
        let read_cols = reader.open().await.unwrap();
        assert_eq!(read_cols[1].name, "score");
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row, vec![Value::Text("a".into()), Value::Text("1.5".into())]);
    }

    #[tokio::test]
    async fn test_writer_encodes_typed_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typed.csv");

        let mut writer = FlatFileWriter::new(&path, ',');
        writer
            .open(&[ColumnDescriptor::new("v", "Int64")])
            .await
            .unwrap();
        writer.write_row(vec![Value::Int(-7)]).await.unwrap();
        writer.write_row(vec![Value::Null]).await.unwrap();
        writer.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "v\n-7\n\n");
    }
}
