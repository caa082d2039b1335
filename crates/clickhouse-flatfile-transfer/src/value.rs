//! Typed values and the text codec used on the flat-file side.
//!
//! A value is one of: signed/unsigned 64-bit integer, 64-bit float, text,
//! timestamp (UTC, second precision), or null. The codec renders values to
//! delimited-file text and parses text back per logical type.
//!
//! Known limitation: an empty text field decodes to the logical type's zero
//! value (0, 0.0, Unix epoch) rather than null. This mirrors the ingestion
//! behavior the tool has always had and is not a null-preserving design.

use chrono::NaiveDateTime;

use crate::error::{Result, TransferError};
use crate::schema::ColumnDescriptor;
use crate::typemap::LogicalType;

/// Timestamp layout used everywhere: parsing, rendering, and inference.
/// No timezone offset or fractional seconds are supported.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed value flowing through a transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL or absent.
    Null,

    /// 64-bit signed integer.
    Int(i64),

    /// 64-bit unsigned integer.
    UInt(u64),

    /// 64-bit floating point.
    Float(f64),

    /// Text, or the opaque native rendering of an unclassified type.
    Text(String),

    /// Timestamp in UTC with second precision.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// The logical type this value naturally belongs to.
    ///
    /// `Null` reports `Unknown` since it carries no type of its own.
    pub fn logical_type(&self) -> LogicalType {
        match self {
            Value::Null => LogicalType::Unknown,
            Value::Int(_) => LogicalType::SignedInt,
            Value::UInt(_) => LogicalType::UnsignedInt,
            Value::Float(_) => LogicalType::Float,
            Value::Text(_) => LogicalType::Text,
            Value::Timestamp(_) => LogicalType::Timestamp,
        }
    }

    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Render a value as flat-file text.
///
/// Integers render in base 10 with no grouping, floats in decimal notation
/// (Rust's `Display` for `f64` never emits an exponent), timestamps as
/// `YYYY-MM-DD HH:MM:SS`, and null as the empty string.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Parse flat-file text into a typed value for the given logical type.
///
/// `column` and `row` (1-based) identify the field in the error on parse
/// failure; a failure aborts the whole transfer.
pub fn decode(logical: LogicalType, raw: &str, column: &str, row: u64) -> Result<Value> {
    if raw.is_empty() {
        return Ok(zero_value(logical));
    }

    match logical {
        LogicalType::SignedInt => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| TransferError::conversion(column, row, raw, e.to_string())),
        LogicalType::UnsignedInt => raw
            .parse::<u64>()
            .map(Value::UInt)
            .map_err(|e| TransferError::conversion(column, row, raw, e.to_string())),
        LogicalType::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| TransferError::conversion(column, row, raw, e.to_string())),
        LogicalType::Timestamp => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map(Value::Timestamp)
            .map_err(|e| TransferError::conversion(column, row, raw, e.to_string())),
        LogicalType::Text | LogicalType::Unknown => Ok(Value::Text(raw.to_string())),
    }
}

/// The zero value an empty field decodes to.
pub fn zero_value(logical: LogicalType) -> Value {
    match logical {
        LogicalType::SignedInt => Value::Int(0),
        LogicalType::UnsignedInt => Value::UInt(0),
        LogicalType::Float => Value::Float(0.0),
        LogicalType::Timestamp => Value::Timestamp(NaiveDateTime::default()),
        LogicalType::Text | LogicalType::Unknown => Value::Text(String::new()),
    }
}

/// Reshape a value to the destination column's logical type.
///
/// Text and Unknown destinations take the encoded text form. Typed
/// destinations receive already-aligned values as-is; text is parsed; any
/// other mismatch round-trips through the codec so the same parse rules (and
/// the same `ConversionError`) apply.
pub fn convert(value: Value, dest: &ColumnDescriptor, row: u64) -> Result<Value> {
    match dest.logical_type {
        LogicalType::Text | LogicalType::Unknown => Ok(Value::Text(encode(&value))),
        logical if value.logical_type() == logical => Ok(value),
        logical => match value {
            // Empty/null feeds the zero-value policy via decode.
            Value::Null => Ok(zero_value(logical)),
            Value::Text(raw) => decode(logical, &raw, &dest.name, row),
            other => decode(logical, &encode(&other), &dest.name, row),
        },
    }
}

/// Convert every value of a row to its destination column's logical type.
pub fn convert_row(row: Vec<Value>, dest: &[ColumnDescriptor], row_number: u64) -> Result<Vec<Value>> {
    row.into_iter()
        .zip(dest.iter())
        .map(|(value, col)| convert(value, col, row_number))
        .collect()
}
