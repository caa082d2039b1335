//! Classification of native ClickHouse type names into logical types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of value kinds all native column types are classified into.
///
/// Unresolved names map to [`LogicalType::Unknown`] and are read/written as
/// their native textual form without numeric or temporal validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    SignedInt,
    UnsignedInt,
    Float,
    Text,
    Timestamp,
    Unknown,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::SignedInt => "SignedInt",
            LogicalType::UnsignedInt => "UnsignedInt",
            LogicalType::Float => "Float",
            LogicalType::Text => "Text",
            LogicalType::Timestamp => "Timestamp",
            LogicalType::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Classify a native ClickHouse type name into a [`LogicalType`].
///
/// Total function: every input resolves to exactly one logical type, with
/// unrecognized names falling through to `Unknown`. `Nullable(T)` and
/// `LowCardinality(T)` wrappers are unwrapped before classification, and
/// `DateTime('<tz>')` classifies the same as bare `DateTime`.
pub fn classify(native_type: &str) -> LogicalType {
    let inner = unwrap_modifiers(native_type.trim());

    match inner {
        "UInt8" | "UInt16" | "UInt32" | "UInt64" => LogicalType::UnsignedInt,
        "Int8" | "Int16" | "Int32" | "Int64" => LogicalType::SignedInt,
        "Float32" | "Float64" => LogicalType::Float,
        "String" => LogicalType::Text,
        "DateTime" => LogicalType::Timestamp,
        other if other.starts_with("DateTime(") => LogicalType::Timestamp,
        _ => LogicalType::Unknown,
    }
}

/// Strip `Nullable(...)` and `LowCardinality(...)` wrappers, innermost first.
fn unwrap_modifiers(native_type: &str) -> &str {
    let mut current = native_type;
    loop {
        let stripped = current
            .strip_prefix("Nullable(")
            .or_else(|| current.strip_prefix("LowCardinality("))
            .and_then(|rest| rest.strip_suffix(')'));
        match stripped {
            Some(inner) => current = inner,
            None => return current,
        }
    }
}
