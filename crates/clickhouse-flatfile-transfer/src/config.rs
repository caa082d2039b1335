//! Configuration types for the two channel backends.
//!
//! Paths and directories are explicit parameters here rather than ambient
//! process state: callers resolve full paths before constructing channels.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, TransferError};
use crate::flatfile::DEFAULT_DELIMITER;

/// ClickHouse connection configuration (HTTP interface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// Server host.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP interface port (default: 8123).
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,

    /// Username.
    #[serde(default = "default_user")]
    pub user: String,

    /// Password or JWT token. May be empty.
    #[serde(default)]
    pub password: String,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            database: default_database(),
            user: default_user(),
            password: String::new(),
        }
    }
}

impl ClickHouseConfig {
    /// Base URL of the HTTP interface.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    /// Validate that the required connection fields are present.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(TransferError::Config("ClickHouse host is required".into()));
        }
        if self.database.is_empty() {
            return Err(TransferError::Config(
                "ClickHouse database is required".into(),
            ));
        }
        if self.user.is_empty() {
            return Err(TransferError::Config("ClickHouse user is required".into()));
        }
        Ok(())
    }
}

/// Flat-file channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatFileConfig {
    /// Full path of the file to read or write.
    pub path: PathBuf,

    /// Single-character field delimiter (default: `,`).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl FlatFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_http_port() -> u16 {
    8123
}

fn default_database() -> String {
    "default".to_string()
}

fn default_user() -> String {
    "default".to_string()
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_yaml() {
        let config: ClickHouseConfig = serde_yaml::from_str("host: ch.example.com").unwrap();
        assert_eq!(config.host, "ch.example.com");
        assert_eq!(config.port, 8123);
        assert_eq!(config.database, "default");
        assert_eq!(config.user, "default");
        assert!(config.password.is_empty());
        assert_eq!(config.endpoint(), "http://ch.example.com:8123/");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut config = ClickHouseConfig::default();
        config.host.clear();
        assert!(matches!(
            config.validate().unwrap_err(),
            TransferError::Config(_)
        ));
    }

    #[test]
    fn test_flat_file_defaults() {
        let config: FlatFileConfig = serde_yaml::from_str("path: /tmp/in.csv").unwrap();
        assert_eq!(config.delimiter, ',');
        let config = FlatFileConfig::new("/tmp/in.csv").with_delimiter(';');
        assert_eq!(config.delimiter, ';');
    }
}
