//! Error types for transfer operations.
//!
//! Every error is fatal to the enclosing transfer: there is no retry or
//! row-skipping. Errors carry the column name and 1-based row offset where
//! one applies, so a failure can be diagnosed without re-running.

use thiserror::Error;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Configuration error (invalid YAML, missing fields, unsupported
    /// channel pairing, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File open/create/flush failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Query execution failure against ClickHouse.
    #[error("Query failed: {0}")]
    Query(String),

    /// A result value could not be read into its expected native form.
    #[error("Failed to scan row {row}, column {column}: {message}")]
    Scan {
        row: u64,
        column: String,
        message: String,
    },

    /// Malformed flat-file line (wrong field count).
    #[error("Malformed line {line}: expected {expected} fields, found {found}")]
    Format {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Text-to-typed-value parse failure, or the reverse.
    #[error("Failed to convert value {value:?} for column {column} (row {row}): {message}")]
    Conversion {
        column: String,
        row: u64,
        value: String,
        message: String,
    },

    /// Missing table or column during destination schema lookup.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The destination rejected the final batch send.
    #[error("Batch insert failed: {0}")]
    Batch(String),
}

impl TransferError {
    /// Create a Conversion error.
    pub fn conversion(
        column: impl Into<String>,
        row: u64,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TransferError::Conversion {
            column: column.into(),
            row,
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a Scan error.
    pub fn scan(row: u64, column: impl Into<String>, message: impl Into<String>) -> Self {
        TransferError::Scan {
            row,
            column: column.into(),
            message: message.into(),
        }
    }

    /// Stable kind name for API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Config(_) => "ConfigError",
            TransferError::Io(_) => "IOError",
            TransferError::Query(_) => "QueryError",
            TransferError::Scan { .. } => "ScanError",
            TransferError::Format { .. } => "FormatError",
            TransferError::Conversion { .. } => "ConversionError",
            TransferError::Schema(_) => "SchemaError",
            TransferError::Batch(_) => "BatchError",
        }
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
