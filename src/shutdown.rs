//! Cooperative cancellation
//!
//! The Ctrl-C handler flips a sticky flag; the sync loop polls it between
//! pages, so an interrupted run always stops on a page boundary with its
//! bookmarks intact and resumable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag handed to the sync loop.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Sticky cancellation flag.
///
/// Once shutdown is requested it stays requested for the rest of the
/// process; there is no reset.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
}

impl ShutdownCoordinator {
    /// A flag in the not-requested state
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared flag ready to hand to signal handlers and the sync loop
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request cancellation at the next page boundary
    pub fn request_shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
