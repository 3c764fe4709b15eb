//! Page token sequencing
//!
//! Pagination is a pure transition function from (previous token, start,
//! signpost, step) to the next page token. Keeping it pure makes the cursor
//! arithmetic exhaustively testable without any I/O; the [`PageTokenSequencer`]
//! wrapper adds the little state the sync loop needs.

use std::cmp::Ordering;

use thiserror::Error;

use crate::{CursorValue, PageStep};

/// Pagination failures. All of them are partition-fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationError {
    /// The candidate token equals the previously emitted token
    #[error("pagination loop detected: token {token} did not advance")]
    Loop {
        /// Token that repeated
        token: CursorValue,
    },

    /// Cursor, signpost, and step do not share a cursor kind
    #[error("cursor kind mismatch: cannot advance {token} by {step}")]
    KindMismatch {
        /// Current cursor position
        token: CursorValue,
        /// Step that was applied
        step: PageStep,
    },

    /// Advancing the cursor left the representable range
    #[error("cursor overflow: cannot advance {token} by {step}")]
    Overflow {
        /// Current cursor position
        token: CursorValue,
        /// Step that was applied
        step: PageStep,
    },
}

/// Outcome of one sequencing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    /// Fetch a page at this token
    Next(CursorValue),
    /// The cursor window is exhausted
    Done,
}

/// Compute the page token after `previous`.
///
/// Seeds from `start` when no token has been emitted yet. The signpost is an
/// inclusive ceiling: once the cursor reaches it the sequence is done.
/// Day steps advance by whole days; epoch chunks advance by a bounded number
/// of milliseconds and clamp to the signpost. Emitted tokens strictly
/// increase; a candidate that repeats the previous emission is a loop error,
/// except that a chunk clamped back onto the current position just means the
/// window is exhausted.
pub fn next_page_token(
    previous: Option<CursorValue>,
    start: CursorValue,
    signpost: CursorValue,
    step: PageStep,
) -> Result<PageToken, PaginationError> {
    let current = previous.unwrap_or(start);

    let kind = step.cursor_kind();
    if current.kind() != kind || signpost.kind() != kind {
        return Err(PaginationError::KindMismatch {
            token: current,
            step,
        });
    }

    // Kinds match, so compare cannot fail
    if current.compare(&signpost) != Some(Ordering::Less) {
        return Ok(PageToken::Done);
    }

    let candidate = current
        .advance(&step)
        .ok_or(PaginationError::Overflow {
            token: current,
            step,
        })?;

    let candidate = match step {
        PageStep::Days(_) => candidate,
        PageStep::EpochChunkMs(_) => {
            let clamped = candidate.clamp_to(&signpost).unwrap_or(candidate);
            if clamped == current {
                // A chunk that cannot move past the current position means
                // the window is exhausted, not stuck
                return Ok(PageToken::Done);
            }
            clamped
        }
    };

    if previous == Some(candidate) {
        return Err(PaginationError::Loop { token: candidate });
    }

    Ok(PageToken::Next(candidate))
}

/// Stateful token sequencer for one partition sync.
///
/// Remembers the last emitted token and latches once the window is
/// exhausted.
#[derive(Debug)]
pub struct PageTokenSequencer {
    start: CursorValue,
    signpost: CursorValue,
    step: PageStep,
    previous: Option<CursorValue>,
    done: bool,
}

impl PageTokenSequencer {
    /// Start a sequence from `start` up to the `signpost` ceiling
    pub fn new(start: CursorValue, signpost: CursorValue, step: PageStep) -> Self {
        Self {
            start,
            signpost,
            step,
            previous: None,
            done: false,
        }
    }

    /// The signpost this sequence was snapshotted with
    pub fn signpost(&self) -> CursorValue {
        self.signpost
    }

    /// The most recently emitted token
    pub fn last_token(&self) -> Option<CursorValue> {
        self.previous
    }

    /// Emit the next page token, or `None` once the window is exhausted
    pub fn next(&mut self) -> Result<Option<CursorValue>, PaginationError> {
        if self.done {
            return Ok(None);
        }
        match next_page_token(self.previous, self.start, self.signpost, self.step)? {
            PageToken::Next(token) => {
                self.previous = Some(token);
                Ok(Some(token))
            }
            PageToken::Done => {
                self.done = true;
                Ok(None)
            }
        }
    }
}
