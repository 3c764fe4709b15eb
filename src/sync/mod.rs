//! Incremental sync orchestration
//!
//! This module drives the extraction workflow: pagination, pacing, cursor
//! resolution and the partition loop that ties them to the HTTP client and
//! the state store.
//!
//! # Overview
//!
//! A sync run walks every configured stream:
//!
//! 1. **Cursor resolution**: [`cursor::resolve_start`] picks the stored
//!    bookmark or the configured start date
//! 2. **Pagination**: [`paginator::PageTokenSequencer`] derives the page
//!    tokens between cursor and signpost
//! 3. **Pacing**: [`throttle::Throttle`] spaces requests on the free tier
//! 4. **Execution**: [`runner::SyncRunner`] fetches, parses, bookmarks and
//!    emits each page
//!
//! # Quick Start
//!
//! ```no_run
//! use coingecko_extractor::output::JsonlWriter;
//! use coingecko_extractor::state::FileStateStore;
//! use coingecko_extractor::sync::SyncRunner;
//! use coingecko_extractor::TapConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TapConfig::from_file("config.json")?;
//! let state = FileStateStore::open("state.json")?;
//! let mut writer = JsonlWriter::stdout();
//!
//! let mut runner = SyncRunner::new(&config, state)?;
//! let report = runner.sync_all(&mut writer).await?;
//! println!("{} records emitted", report.total_records());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Errors split into two tiers. Configuration and state-persistence problems
//! abort the whole run as [`SyncError`]. Everything scoped to one partition
//! (retry-exhausted transport errors, parse failures, pagination faults) is
//! recorded in the [`SyncReport`] and the run moves on to the next partition.

pub mod cursor;
pub mod paginator;
pub mod runner;
pub mod throttle;

pub use cursor::resolve_start;
pub use paginator::{next_page_token, PageToken, PageTokenSequencer, PaginationError};
pub use runner::SyncRunner;
pub use throttle::Throttle;

use serde::Serialize;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::output::OutputError;
use crate::state::StateError;
use crate::streams::ParseError;

/// Sync errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API client error
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// State store error
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Response parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Page token sequencing error
    #[error("pagination error: {0}")]
    Pagination(#[from] PaginationError),

    /// Output sink error
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// How a single partition sync ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionOutcome {
    /// Every page up to the signpost was fetched and emitted
    Completed,
    /// The API returned 404 for this partition; skipped, siblings unaffected
    SkippedNotFound,
    /// A partition-fatal error stopped the sync partway
    Failed,
    /// Shutdown was requested between pages
    Cancelled,
}

impl PartitionOutcome {
    /// Stable lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionOutcome::Completed => "completed",
            PartitionOutcome::SkippedNotFound => "skipped_not_found",
            PartitionOutcome::Failed => "failed",
            PartitionOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PartitionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accounting for one partition within a run
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    /// Stream name
    pub stream: String,
    /// Partition token, `None` for unpartitioned streams
    pub partition: Option<String>,
    /// Pages fetched and parsed
    pub pages: u64,
    /// Records emitted
    pub records: u64,
    /// Final outcome
    pub outcome: PartitionOutcome,
    /// Error message when the outcome is `Failed`
    pub error: Option<String>,
}

impl PartitionReport {
    pub(crate) fn new(stream: &str, partition: Option<&str>) -> Self {
        Self {
            stream: stream.to_string(),
            partition: partition.map(str::to_string),
            pages: 0,
            records: 0,
            outcome: PartitionOutcome::Completed,
            error: None,
        }
    }

    /// Label for logs and summaries: `stream` or `stream[partition]`
    pub fn label(&self) -> String {
        match &self.partition {
            Some(partition) => format!("{}[{}]", self.stream, partition),
            None => self.stream.clone(),
        }
    }
}

/// Aggregate accounting for a whole sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// One entry per partition attempted, in sync order
    pub partitions: Vec<PartitionReport>,
}

impl SyncReport {
    /// Total records emitted across all partitions
    pub fn total_records(&self) -> u64 {
        self.partitions.iter().map(|p| p.records).sum()
    }

    /// Total pages fetched across all partitions
    pub fn total_pages(&self) -> u64 {
        self.partitions.iter().map(|p| p.pages).sum()
    }

    /// Partitions that ended in `Failed`
    pub fn failures(&self) -> impl Iterator<Item = &PartitionReport> {
        self.partitions
            .iter()
            .filter(|p| p.outcome == PartitionOutcome::Failed)
    }

    /// True when at least one partition failed
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// True when the run was cut short by a shutdown request
    pub fn cancelled(&self) -> bool {
        self.partitions
            .iter()
            .any(|p| p.outcome == PartitionOutcome::Cancelled)
    }
}
