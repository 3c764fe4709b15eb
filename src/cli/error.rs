//! CLI error types and conversions

use crate::config::ConfigError;
use crate::output::OutputError;
use crate::state::StateError;
use crate::sync::SyncError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Sync run error
    #[error("sync error: {0}")]
    SyncError(#[from] SyncError),

    /// State store error
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),
}
