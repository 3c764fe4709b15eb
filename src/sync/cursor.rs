//! Starting cursor resolution
//!
//! Where does a partition sync begin? The stored bookmark wins; without one
//! the stream's configured start cursor seeds the sequence. A bookmark that
//! cannot be parsed into the stream's cursor kind is an error, never silently
//! replaced, because quietly restarting from the beginning would re-deliver
//! the partition's entire history.

use tracing::debug;

use crate::state::{StateError, StateStore};
use crate::{CursorKind, CursorValue};

/// Resolve the cursor a partition sync starts from.
///
/// Returns the parsed bookmark when one exists, otherwise `fallback` (the
/// stream's start cursor; `None` for streams that are not cursor-seeded).
pub fn resolve_start(
    state: &dyn StateStore,
    stream: &str,
    replication_key: &str,
    kind: CursorKind,
    partition: &str,
    fallback: Option<CursorValue>,
) -> Result<Option<CursorValue>, StateError> {
    let Some(bookmark) = state.bookmark(stream, partition) else {
        if let Some(start) = fallback {
            debug!(stream, partition, start = %start, "No bookmark; starting from configured start");
        }
        return Ok(fallback);
    };

    if bookmark.replication_key != replication_key {
        return Err(StateError::MalformedBookmark {
            stream: stream.to_string(),
            partition: partition.to_string(),
            detail: format!(
                "bookmark tracks {:?} but the stream replicates on {:?}",
                bookmark.replication_key, replication_key
            ),
        });
    }

    let value = CursorValue::from_state_value(kind, &bookmark.replication_key_value).map_err(
        |detail| StateError::MalformedBookmark {
            stream: stream.to_string(),
            partition: partition.to_string(),
            detail,
        },
    )?;

    debug!(stream, partition, bookmark = %value, "Resuming from bookmark");
    Ok(Some(value))
}
