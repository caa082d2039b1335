//! Channel contract: produce or consume an ordered sequence of named
//! columns and rows of typed values.
//!
//! A channel is backed either by a flat file or by a ClickHouse connection.
//! Channels own their underlying file handles/connections for the transfer's
//! lifetime and release them when the channel is dropped, on every exit path.

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::ColumnDescriptor;
use crate::value::Value;

/// What backs a channel. Used to reject unsupported pairings
/// (file-to-file transfers have no conversion side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    FlatFile,
    Database,
}

/// Produces rows for a transfer.
#[async_trait]
pub trait RowSource: Send {
    /// Open the source and return its column descriptors.
    ///
    /// Must be called exactly once, before the first [`next_row`] call.
    ///
    /// [`next_row`]: RowSource::next_row
    async fn open(&mut self) -> Result<Vec<ColumnDescriptor>>;

    /// Produce the next row, or `None` when the source is exhausted.
    ///
    /// Rows align positionally with the descriptors returned by `open`.
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>>;

    /// What backs this source.
    fn kind(&self) -> ChannelKind;
}

/// Consumes rows for a transfer.
#[async_trait]
pub trait RowSink: Send {
    /// Open the sink for the given source columns and return the
    /// destination descriptors the transfer must convert into.
    ///
    /// Returned descriptors align positionally with `source_columns`.
    async fn open(&mut self, source_columns: &[ColumnDescriptor]) -> Result<Vec<ColumnDescriptor>>;

    /// Write one row, already converted to the destination descriptors.
    async fn write_row(&mut self, row: Vec<Value>) -> Result<()>;

    /// Finalize the destination: flush for files, batch-send for the
    /// database. Nothing is guaranteed durable until this returns `Ok`.
    async fn finish(&mut self) -> Result<()>;

    /// What backs this sink.
    fn kind(&self) -> ChannelKind;
}
