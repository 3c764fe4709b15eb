//! Record output writers

pub mod jsonl;

pub use jsonl::JsonlWriter;

use crate::schema::RecordSchema;
use crate::streams::Record;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Sink for stream schemas and records
///
/// The sync loop announces each stream's schema once, then hands over
/// records page by page and flushes at page boundaries so a crash never
/// leaves a half-written page buffered.
pub trait RecordWriter: Send {
    /// Announce a stream's schema before any of its records
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &RecordSchema,
        key_properties: &[&str],
    ) -> OutputResult<()>;

    /// Write a single record
    fn write_record(&mut self, stream: &str, record: &Record) -> OutputResult<()>;

    /// Write a full page of records
    fn write_records(&mut self, stream: &str, records: &[Record]) -> OutputResult<()> {
        for record in records {
            self.write_record(stream, record)?;
        }
        Ok(())
    }

    /// Flush any buffered output
    fn flush(&mut self) -> OutputResult<()>;
}
