//! Server configuration.
//!
//! File locations are explicit settings. Request payloads never carry full
//! filesystem paths: flat-file names resolve against `data_dir`, and every
//! database-to-file ingestion writes to `output_dir`.

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use clickhouse_flatfile_transfer::TransferError;

/// Settings for the HTTP server, loadable from a YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:5000".
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory that flat-file sources are resolved against.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory that ingestion output files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl ServerConfig {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve a client-supplied file name inside the data directory.
    ///
    /// Absolute paths and parent components are rejected so requests cannot
    /// reach outside `data_dir`.
    pub fn resolve_data_path(&self, file_name: &str) -> Result<PathBuf, TransferError> {
        let relative = Path::new(file_name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if file_name.is_empty() || escapes {
            return Err(TransferError::Config(format!(
                "invalid file name: {file_name}"
            )));
        }
        Ok(self.data_dir.join(relative))
    }

    /// Path of the fixed ingestion output file.
    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join("output.csv")
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_yaml() {
        let config: ServerConfig = serde_yaml::from_str("bind: 127.0.0.1:8080").unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.output_file(), PathBuf::from("output/output.csv"));
    }

    #[test]
    fn test_data_path_stays_inside_data_dir() {
        let config = ServerConfig::default();
        assert_eq!(
            config.resolve_data_path("in.csv").unwrap(),
            PathBuf::from("data/in.csv")
        );
        assert!(config.resolve_data_path("../etc/passwd").is_err());
        assert!(config.resolve_data_path("/etc/passwd").is_err());
        assert!(config.resolve_data_path("").is_err());
    }
}
