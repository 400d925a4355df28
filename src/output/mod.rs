//! Record output writers

use crate::MappedRecord;

pub mod ndjson;

pub use ndjson::NdjsonWriter;

/// Output writer errors.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    Flush(String),
}

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Streaming record writer.
pub trait RecordWriter {
    /// Write a single mapped record.
    fn write_record(&mut self, record: &MappedRecord) -> OutputResult<()>;

    /// Write multiple records at once.
    fn write_records(&mut self, records: &[MappedRecord]) -> OutputResult<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Flush any buffered data to disk.
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output.
    fn close(self) -> OutputResult<()>;
}
