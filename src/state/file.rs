//! File-backed bookmark state
//!
//! Persists the bookmark document as versioned JSON with atomic writes and
//! advisory file locking so concurrent runs against the same state file
//! cannot interleave partial writes.

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Bookmark, StateError, StateStore};

/// Current state document schema version
pub const STATE_SCHEMA_VERSION: &str = "1.0.0";

/// Largest state document the store will parse (10 MB)
pub const MAX_STATE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// On-disk document shape:
/// `{ "schema_version": "...", "bookmarks": { stream: { partition: bookmark } } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateDocument {
    schema_version: String,
    bookmarks: BTreeMap<String, BTreeMap<String, Bookmark>>,
}

impl StateDocument {
    fn empty() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION.to_string(),
            bookmarks: BTreeMap::new(),
        }
    }
}

/// Durable bookmark store backed by a JSON file.
///
/// Every [`StateStore::set_bookmark`] call rewrites the document atomically
/// (temp file + rename + directory fsync), so a crash mid-sync leaves either
/// the previous or the new bookmark on disk, never a torn file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    doc: StateDocument,
}

impl FileStateStore {
    /// Open a state file, creating an empty document if it does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();

        if !path.exists() {
            debug!(path = %path.display(), "No state file found, starting fresh");
            return Ok(Self {
                path,
                doc: StateDocument::empty(),
            });
        }

        let doc = Self::load_document(&path)?;
        info!(
            path = %path.display(),
            streams = doc.bookmarks.len(),
            "Loaded bookmark state"
        );

        Ok(Self { path, doc })
    }

    /// The path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Streams tracked by this document with their bookmark counts
    pub fn stream_summary(&self) -> Vec<(&str, usize)> {
        self.doc
            .bookmarks
            .iter()
            .map(|(stream, partitions)| (stream.as_str(), partitions.len()))
            .collect()
    }

    fn load_document(path: &Path) -> Result<StateDocument, StateError> {
        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StateError::LockError(format!("Failed to create lock file: {e}")))?;

        let lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| StateError::LockError(format!("Failed to acquire read lock: {e}")))?;

        // The whole document is parsed in memory; refuse oversized files
        let metadata = std::fs::metadata(path).map_err(|e| StateError::IoError(e.to_string()))?;
        if metadata.len() > MAX_STATE_FILE_SIZE {
            return Err(StateError::StateTooLarge {
                size: metadata.len(),
                max: MAX_STATE_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| StateError::IoError(e.to_string()))?;

        let doc: StateDocument = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, "Failed to deserialize bookmark state");
            StateError::DeserializationError(e.to_string())
        })?;

        if doc.schema_version != STATE_SCHEMA_VERSION {
            warn!(
                found_version = %doc.schema_version,
                expected_version = STATE_SCHEMA_VERSION,
                "State schema version mismatch"
            );
            return Err(StateError::SchemaVersionMismatch {
                expected: STATE_SCHEMA_VERSION.to_string(),
                found: doc.schema_version,
            });
        }

        Ok(doc)
    }

    /// Write the document atomically under the advisory write lock
    fn save(&self) -> Result<(), StateError> {
        debug!(
            path = %self.path.display(),
            streams = self.doc.bookmarks.len(),
            "Saving bookmark state"
        );

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StateError::IoError(e.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| StateError::SerializationError(e.to_string()))?;

        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StateError::LockError(format!("Failed to create lock file: {e}")))?;

        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| StateError::LockError(format!("Failed to acquire write lock: {e}")))?;

        // NamedTempFile in the same directory so persist() is a rename
        let parent_dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| StateError::IoError(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| StateError::IoError(format!("Failed to write to temp file: {e}")))?;

        // Flush to OS and sync to disk for durability before the atomic rename
        temp_file
            .flush()
            .map_err(|e| StateError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| StateError::IoError(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(&self.path)
            .map_err(|e| StateError::IoError(format!("Failed to persist temp file: {e}")))?;

        // The rename is not durable until the parent directory is fsynced
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn bookmark(&self, stream: &str, partition: &str) -> Option<Bookmark> {
        self.doc.bookmarks.get(stream)?.get(partition).cloned()
    }

    fn set_bookmark(
        &mut self,
        stream: &str,
        partition: &str,
        bookmark: Bookmark,
    ) -> Result<(), StateError> {
        self.doc
            .bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(partition.to_string(), bookmark);
        self.save()
    }
}
