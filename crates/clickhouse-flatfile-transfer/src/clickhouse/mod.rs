//! ClickHouse channel over the HTTP interface.
//!
//! Queries run with `FORMAT JSONCompactEachRowWithNamesAndTypes` so column
//! names and native type names arrive ahead of the data and rows can be
//! scanned lazily off the response stream. Inserts buffer rows as
//! `JSONCompactEachRow` lines and send the whole batch in a single POST.

mod reader;
mod writer;

pub use reader::ClickHouseReader;
pub use writer::ClickHouseWriter;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::config::ClickHouseConfig;
use crate::error::{Result, TransferError};
use crate::schema::ColumnDescriptor;
use crate::typemap::LogicalType;
use crate::value::{Value, TIMESTAMP_FORMAT};

/// A ClickHouse connection handle.
///
/// Cheap to share by reference; readers and writers borrow it for the
/// duration of one transfer.
pub struct ClickHouseClient {
    http: reqwest::Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Create a client for the given connection configuration.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransferError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// The connection configuration this client was built from.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Check that the server is reachable and credentials are accepted.
    pub async fn ping(&self) -> Result<()> {
        self.run("SELECT 1", None)
            .await
            .map(|_| ())
            .map_err(TransferError::Query)
    }

    /// Execute a statement. When `body` is given, the statement goes in the
    /// `query` URL parameter and the body carries the data (insert path).
    ///
    /// Returns the server's error text on a non-success status so callers
    /// can wrap it in the right error kind.
    pub(crate) async fn run(
        &self,
        statement: &str,
        body: Option<String>,
    ) -> std::result::Result<reqwest::Response, String> {
        let mut request = self
            .http
            .post(self.config.endpoint())
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .query(&[
                ("database", self.config.database.as_str()),
                // Keep 64-bit integers as JSON numbers; serde_json reads
                // them back exactly.
                ("output_format_json_quote_64bit_integers", "0"),
            ]);

        request = match body {
            Some(data) => request.query(&[("query", statement)]).body(data),
            None => request.body(statement.to_string()),
        };

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("server returned {status}: {}", text.trim()));
        }
        Ok(response)
    }

    /// Run a query and collect every field of every row as display text.
    ///
    /// For small metadata queries only; the transfer path streams instead.
    pub(crate) async fn query_text_rows(&self, query: &str) -> Result<Vec<Vec<String>>> {
        let statement = format!("{} FORMAT JSONCompactEachRow", query.trim().trim_end_matches(';'));
        let response = self
            .run(&statement, None)
            .await
            .map_err(TransferError::Query)?;
        let text = response
            .text()
            .await
            .map_err(|e| TransferError::Query(e.to_string()))?;

        let mut rows = Vec::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let fields: Vec<serde_json::Value> = serde_json::from_str(line)
                .map_err(|e| TransferError::Query(format!("malformed result row: {e}")))?;
            rows.push(fields.iter().map(json_to_text).collect());
        }
        Ok(rows)
    }

    /// Fetch `(name, native type)` for each column of a table, in
    /// declaration order.
    pub async fn describe_table(&self, table: &str) -> Result<Vec<(String, String)>> {
        let statement = format!("DESCRIBE TABLE {}", quote_table(table));
        let rows = self.query_text_rows(&statement).await.map_err(|e| match e {
            // A missing table surfaces as a query failure; this is a schema
            // lookup, so report it as one.
            TransferError::Query(msg) => TransferError::Schema(msg),
            other => other,
        })?;

        rows.into_iter()
            .map(|row| match &row[..] {
                [name, native_type, ..] => Ok((name.clone(), native_type.clone())),
                _ => Err(TransferError::Schema(format!(
                    "unexpected DESCRIBE row for table {table}"
                ))),
            })
            .collect()
    }
}

/// Quote a ClickHouse identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Quote a possibly database-qualified table reference.
pub fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Read a JSON field into a typed value using a scan target selected by the
/// column's classified native type, avoiding lossy generic decoding.
pub(crate) fn scan_value(
    field: &serde_json::Value,
    column: &ColumnDescriptor,
    row: u64,
) -> Result<Value> {
    use serde_json::Value as Json;

    if field.is_null() {
        return Ok(Value::Null);
    }

    match column.logical_type {
        LogicalType::UnsignedInt => match field {
            Json::Number(n) => n.as_u64().map(Value::UInt).ok_or_else(|| {
                TransferError::scan(row, &column.name, format!("expected unsigned integer, got {n}"))
            }),
            Json::String(s) => s
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|e| TransferError::scan(row, &column.name, e.to_string())),
            other => Err(TransferError::scan(
                row,
                &column.name,
                format!("expected unsigned integer, got {other}"),
            )),
        },
        LogicalType::SignedInt => match field {
            Json::Number(n) => n.as_i64().map(Value::Int).ok_or_else(|| {
                TransferError::scan(row, &column.name, format!("expected integer, got {n}"))
            }),
            Json::String(s) => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| TransferError::scan(row, &column.name, e.to_string())),
            other => Err(TransferError::scan(
                row,
                &column.name,
                format!("expected integer, got {other}"),
            )),
        },
        LogicalType::Float => match field {
            Json::Number(n) => n.as_f64().map(Value::Float).ok_or_else(|| {
                TransferError::scan(row, &column.name, format!("expected float, got {n}"))
            }),
            Json::String(s) => s
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| TransferError::scan(row, &column.name, e.to_string())),
            other => Err(TransferError::scan(
                row,
                &column.name,
                format!("expected float, got {other}"),
            )),
        },
        LogicalType::Timestamp => match field {
            Json::String(s) => chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map(Value::Timestamp)
                .map_err(|e| TransferError::scan(row, &column.name, e.to_string())),
            other => Err(TransferError::scan(
                row,
                &column.name,
                format!("expected timestamp string, got {other}"),
            )),
        },
        // Text and unclassified types are carried as their textual form
        // without validation.
        LogicalType::Text | LogicalType::Unknown => Ok(Value::Text(json_to_text(field))),
    }
}

/// Render a JSON field as display text (strings unquoted, null empty).
pub(crate) fn json_to_text(field: &serde_json::Value) -> String {
    match field {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Splits a chunked HTTP response body into `\n`-terminated lines.
///
/// Backs the lazy row sequence of [`ClickHouseReader`]: rows are consumed
/// as body chunks arrive instead of buffering the whole result set.
pub(crate) struct JsonLineStream {
    stream: BoxStream<'static, std::result::Result<Bytes, String>>,
    buf: BytesMut,
    done: bool,
}

impl JsonLineStream {
    pub(crate) fn new(stream: BoxStream<'static, std::result::Result<Bytes, String>>) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            done: false,
        }
    }

    /// Wrap an HTTP response body.
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        Self::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| e.to_string()))
                .boxed(),
        )
    }

    /// The next line without its terminator, or `None` at end of stream.
    pub(crate) async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                return Ok(Some(line_to_string(&line[..line.len() - 1])?));
            }
            if self.done {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = self.buf.split();
                return Ok(Some(line_to_string(&rest)?));
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    return Err(TransferError::Query(format!(
                        "error reading result stream: {e}"
                    )))
                }
                None => self.done = true,
            }
        }
    }
}

fn line_to_string(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| TransferError::Query(format!("invalid UTF-8 in result stream: {e}")))?;
    Ok(text.trim_end_matches('\r').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> JsonLineStream {
        let items: Vec<std::result::Result<Bytes, String>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        JsonLineStream::new(stream::iter(items).boxed())
    }

    #[tokio::test]
    async fn test_line_stream_reassembles_split_chunks() {
        let mut lines = chunks(&["[1,", "2]\n[3", ",4]\n"]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "[1,2]");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "[3,4]");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_stream_returns_unterminated_tail() {
        let mut lines = chunks(&["a\nb"]);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "a");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "b");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("events"), "`events`");
        assert_eq!(quote_ident("odd`name"), "`odd\\`name`");
        assert_eq!(quote_table("db.events"), "`db`.`events`");
    }

    fn col(name: &str, native: &str) -> ColumnDescriptor {
        ColumnDescriptor::new(name, native)
    }

    #[test]
    fn test_scan_numbers() {
        let v = serde_json::json!(42);
        assert_eq!(scan_value(&v, &col("c", "UInt64"), 1).unwrap(), Value::UInt(42));
        assert_eq!(scan_value(&v, &col("c", "Int32"), 1).unwrap(), Value::Int(42));
        let v = serde_json::json!(-1);
        assert!(scan_value(&v, &col("c", "UInt8"), 1).is_err());
        let v = serde_json::json!(10.5);
        assert_eq!(
            scan_value(&v, &col("c", "Float64"), 1).unwrap(),
            Value::Float(10.5)
        );
    }

    #[test]
    fn test_scan_quoted_64bit_integers() {
        // Tolerate servers configured to quote wide integers.
        let v = serde_json::json!("18446744073709551615");
        assert_eq!(
            scan_value(&v, &col("c", "UInt64"), 1).unwrap(),
            Value::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_scan_timestamp_and_text() {
        let v = serde_json::json!("2024-01-01 00:00:00");
        assert!(matches!(
            scan_value(&v, &col("c", "DateTime"), 1).unwrap(),
            Value::Timestamp(_)
        ));
        let v = serde_json::json!("hello");
        assert_eq!(
            scan_value(&v, &col("c", "String"), 1).unwrap(),
            Value::Text("hello".into())
        );
    }

    #[test]
    fn test_scan_unknown_is_opaque() {
        let v = serde_json::json!(["a", "b"]);
        assert_eq!(
            scan_value(&v, &col("c", "Array(String)"), 1).unwrap(),
            Value::Text("[\"a\",\"b\"]".into())
        );
    }

    #[test]
    fn test_scan_error_identifies_row_and_column() {
        let v = serde_json::json!("not a number");
        let err = scan_value(&v, &col("qty", "UInt32"), 5).unwrap_err();
        match err {
            TransferError::Scan { row, column, .. } => {
                assert_eq!(row, 5);
                assert_eq!(column, "qty");
            }
            other => panic!("expected Scan, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_null_passes_through() {
        let v = serde_json::Value::Null;
        assert_eq!(scan_value(&v, &col("c", "Int64"), 1).unwrap(), Value::Null);
    }
}
