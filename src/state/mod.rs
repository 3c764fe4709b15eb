//! Bookmark state stores
//!
//! Bookmarks record, per stream and per partition, the highest replication
//! position whose page was fully parsed. The sync loop writes a bookmark
//! after each successful page so an interrupted run resumes exactly where it
//! stopped. Stores are pluggable: the file-backed store gives standalone runs
//! durable, atomically-written state; the in-memory store backs tests and
//! fire-and-forget syncs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CursorValue;

pub mod file;

pub use file::{FileStateStore, MAX_STATE_FILE_SIZE, STATE_SCHEMA_VERSION};

/// One bookmark entry: the replication key and its highest synced value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Name of the stream's replication key (e.g. "date", "timestamp")
    pub replication_key: String,
    /// Highest fully-synced value: a `"YYYY-MM-DD"` string or an epoch-ms
    /// integer, per the stream's cursor kind
    pub replication_key_value: serde_json::Value,
}

impl Bookmark {
    /// Create a bookmark from a raw state value
    pub fn new(replication_key: impl Into<String>, replication_key_value: serde_json::Value) -> Self {
        Self {
            replication_key: replication_key.into(),
            replication_key_value,
        }
    }

    /// Create a bookmark from a cursor value
    pub fn from_cursor(replication_key: impl Into<String>, cursor: &CursorValue) -> Self {
        Self::new(replication_key, cursor.to_state_value())
    }
}

/// Errors related to bookmark state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Schema version mismatch
    #[error("state schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// State file too large
    #[error("state file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// A stored bookmark value could not be parsed into the stream's cursor kind
    #[error("malformed bookmark for {stream}/{partition}: {detail}")]
    MalformedBookmark {
        /// Stream namespace
        stream: String,
        /// Partition key
        partition: String,
        /// Parse failure detail
        detail: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}

/// Bookmark storage consumed by the sync loop.
///
/// Reads are infallible: both implementations keep the document in memory.
/// Writes may fail (the file store persists durably on every set).
pub trait StateStore: Send {
    /// The bookmark for a stream partition, if one exists
    fn bookmark(&self, stream: &str, partition: &str) -> Option<Bookmark>;

    /// Record a bookmark for a stream partition.
    ///
    /// Called only after a page fully parses; implementations must make the
    /// write visible to a subsequent [`StateStore::bookmark`] call.
    fn set_bookmark(
        &mut self,
        stream: &str,
        partition: &str,
        bookmark: Bookmark,
    ) -> Result<(), StateError>;
}

/// Ephemeral in-memory store for tests and fire-and-forget runs
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    bookmarks: BTreeMap<String, BTreeMap<String, Bookmark>>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a bookmark (test setup)
    pub fn with_bookmark(
        mut self,
        stream: &str,
        partition: &str,
        bookmark: Bookmark,
    ) -> Self {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(partition.to_string(), bookmark);
        self
    }
}

impl StateStore for MemoryStateStore {
    fn bookmark(&self, stream: &str, partition: &str) -> Option<Bookmark> {
        self.bookmarks.get(stream)?.get(partition).cloned()
    }

    fn set_bookmark(
        &mut self,
        stream: &str,
        partition: &str,
        bookmark: Bookmark,
    ) -> Result<(), StateError> {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(partition.to_string(), bookmark);
        Ok(())
    }
}
