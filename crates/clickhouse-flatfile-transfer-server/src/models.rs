//! Request and response bodies.
//!
//! Field names are camelCase to match the browser frontend. Connection
//! parameters arrive as strings (the frontend sends form values verbatim),
//! so numeric fields are parsed here rather than by serde.

use serde::{Deserialize, Serialize};

use clickhouse_flatfile_transfer::{ClickHouseConfig, DEFAULT_DELIMITER};

use crate::error::ApiError;

/// Which side of the transfer a request reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    ClickHouse,
    FlatFile,
}

/// Parse a source discriminator, case-insensitively.
pub fn parse_source(raw: &str) -> Result<Source, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "clickhouse" => Ok(Source::ClickHouse),
        "flatfile" => Ok(Source::FlatFile),
        _ => Err(ApiError::bad_request(format!("invalid source type: {raw}"))),
    }
}

/// Column names may arrive with a display suffix, e.g. "id (Int64)".
pub fn strip_type_suffix(column: &str) -> &str {
    column.split(' ').next().unwrap_or(column)
}

/// ClickHouse connection parameters as sent by the frontend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickHouseParams {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub jwt_token: String,
    #[serde(default)]
    pub table: String,
}

impl ClickHouseParams {
    /// Build a validated connection configuration.
    pub fn connection(&self) -> Result<ClickHouseConfig, ApiError> {
        if self.host.is_empty() || self.database.is_empty() || self.user.is_empty() {
            return Err(ApiError::bad_request(
                "missing required ClickHouse configuration",
            ));
        }
        let port = if self.port.is_empty() {
            8123
        } else {
            self.port
                .parse::<u16>()
                .map_err(|_| ApiError::bad_request(format!("invalid port: {}", self.port)))?
        };
        Ok(ClickHouseConfig {
            host: self.host.clone(),
            port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.jwt_token.clone(),
        })
    }

    /// The table name, required for previews and ingestions.
    pub fn table(&self) -> Result<&str, ApiError> {
        if self.table.is_empty() {
            return Err(ApiError::bad_request(
                "missing table name in ClickHouse configuration",
            ));
        }
        Ok(&self.table)
    }
}

/// Flat-file parameters as sent by the frontend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatFileParams {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub delimiter: String,
}

impl FlatFileParams {
    pub fn file_name(&self) -> Result<&str, ApiError> {
        if self.file_name.is_empty() {
            return Err(ApiError::bad_request("missing required file name"));
        }
        Ok(&self.file_name)
    }

    /// First character of the delimiter field, or the default.
    pub fn delimiter(&self) -> char {
        self.delimiter.chars().next().unwrap_or(DEFAULT_DELIMITER)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRequest {
    pub source: String,
    #[serde(default)]
    pub click_house_config: ClickHouseParams,
    #[serde(default)]
    pub flat_file_config: FlatFileParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub source: String,
    #[serde(default)]
    pub click_house_config: ClickHouseParams,
    #[serde(default)]
    pub flat_file_config: FlatFileParams,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub source: String,
    #[serde(default)]
    pub click_house_config: ClickHouseParams,
    #[serde(default)]
    pub flat_file_config: FlatFileParams,
    #[serde(default)]
    pub selected_columns: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub status: String,
    pub record_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}
