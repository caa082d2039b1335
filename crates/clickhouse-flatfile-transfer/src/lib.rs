//! # clickhouse-flatfile-transfer
//!
//! Type-aware bidirectional transfer engine between ClickHouse and delimited
//! flat files.
//!
//! The library moves rows in either direction over a single channel contract:
//!
//! - **Flat file -> ClickHouse**: the destination table's schema is looked up
//!   with `DESCRIBE TABLE`, each text field is decoded into the column's
//!   logical type, and the whole batch is sent as one insert.
//! - **ClickHouse -> flat file**: the query result's column types drive
//!   type-specific scanning, and each value is rendered to text.
//!
//! ## Example
//!
//! ```rust,no_run
//! use clickhouse_flatfile_transfer::{transfer_file_to_database, ClickHouseClient, ClickHouseConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ClickHouseClient::new(ClickHouseConfig::default()).unwrap();
//!     let result = transfer_file_to_database(&client, "data.csv".as_ref(), ',', "events").await;
//!     println!("inserted {} rows", result.record_count);
//! }
//! ```

pub mod channel;
pub mod clickhouse;
pub mod config;
pub mod error;
pub mod flatfile;
pub mod schema;
pub mod transfer;
pub mod typemap;
pub mod value;

// Re-exports for convenient access
pub use channel::{ChannelKind, RowSink, RowSource};
pub use clickhouse::{
    quote_ident, quote_table, ClickHouseClient, ClickHouseReader, ClickHouseWriter,
};
pub use config::{ClickHouseConfig, FlatFileConfig};
pub use error::{Result, TransferError};
pub use flatfile::{FlatFileReader, FlatFileWriter, DEFAULT_DELIMITER};
pub use schema::{infer_flat_file_schema, list_tables, ColumnDescriptor, TableSchema};
pub use transfer::{
    preview_rows, transfer_database_to_file, transfer_file_to_database, Preview, TransferEngine,
    TransferResult,
};
pub use typemap::{classify, LogicalType};
pub use value::Value;
