//! JSON-lines output writer
//!
//! Emits singer-flavored messages, one JSON object per line: a `SCHEMA`
//! line when a stream opens, then a `RECORD` line per record. Downstream
//! loaders consume the stream line by line without buffering whole pages.

use serde_json::json;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;

use super::{OutputError, OutputResult, RecordWriter};
use crate::schema::RecordSchema;
use crate::streams::Record;

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// JSON-lines writer over any byte sink
pub struct JsonlWriter {
    out: BufWriter<Box<dyn Write + Send>>,
    lines_written: u64,
}

impl JsonlWriter {
    /// Write to standard output
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Write to a file, creating parent directories as needed
    pub fn to_file<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Creating JSONL writer");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("Failed to create directory: {e}"))
                })?;
            }
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
        Ok(Self::from_writer(file))
    }

    /// Wrap an arbitrary writer (tests use an in-memory buffer)
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, Box::new(writer)),
            lines_written: 0,
        }
    }

    /// Number of lines written so far
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn write_line(&mut self, message: &serde_json::Value) -> OutputResult<()> {
        serde_json::to_writer(&mut self.out, message)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| OutputError::IoError(e.to_string()))?;
        self.lines_written += 1;
        Ok(())
    }
}

impl RecordWriter for JsonlWriter {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &RecordSchema,
        key_properties: &[&str],
    ) -> OutputResult<()> {
        self.write_line(&json!({
            "type": "SCHEMA",
            "stream": stream,
            "schema": schema.to_json(),
            "key_properties": key_properties,
        }))
    }

    fn write_record(&mut self, stream: &str, record: &Record) -> OutputResult<()> {
        self.write_line(&json!({
            "type": "RECORD",
            "stream": stream,
            "record": record,
        }))
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.out
            .flush()
            .map_err(|e| OutputError::IoError(e.to_string()))
    }
}
