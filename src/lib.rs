//! # CoinGecko Extractor Library
//!
//! An incremental extraction engine for CoinGecko market data. Designed for
//! warehouse loading pipelines that need resumable, checkpointed syncs of
//! per-coin price history and market snapshots.
//!
//! ## Features
//!
//! - **Incremental Replication**: Date and epoch-millisecond page tokens with
//!   per-partition bookmarks, so interrupted syncs resume where they stopped
//! - **Partitioned Syncs**: One state partition per configured coin id; a
//!   failing coin never blocks the others
//! - **Tier-Aware Pacing**: Blocking waits between requests on the public
//!   tier, a declared concurrency budget on the pro tier
//! - **Retry Whitelist**: Exponential backoff for timeouts, connection
//!   failures, 429 and 5xx; everything else fails fast
//! - **Multiple Streams**: Daily history, hourly market charts, categories,
//!   asset profiles, and market-wide snapshot streams
//!
//! ## Quick Start
//!
//! ```no_run
//! use coingecko_extractor::config::TapConfig;
//! use coingecko_extractor::output::JsonlWriter;
//! use coingecko_extractor::state::MemoryStateStore;
//! use coingecko_extractor::sync::SyncRunner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TapConfig::from_file("config.json")?;
//! let state = MemoryStateStore::new();
//! let mut writer = JsonlWriter::stdout();
//!
//! let mut runner = SyncRunner::new(&config, state)?;
//! let report = runner.sync_all(&mut writer).await?;
//! println!("{} records emitted", report.total_records());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`config`] - Tap configuration loading and validation
//! - [`client`] - HTTP transport, API tier lookup, and retry policy
//! - [`sync`] - Pagination, cursor resolution, throttling, and the
//!   partitioned sync loop
//! - [`streams`] - Per-stream request shaping and response parsing
//! - [`state`] - Bookmark state stores (in-memory and file-backed)
//! - [`output`] - Record writers (JSON lines)
//!
//! ## Data Model
//!
//! - [`Partition`] - One configured coin id (e.g. `"bitcoin"`)
//! - [`CursorValue`] - A calendar date or epoch-millisecond replication
//!   position; page tokens and bookmarks are both cursor values
//! - [`PageStep`] - The distance between consecutive page tokens

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// HTTP client, API tiers, and retry policy
pub mod client;

/// Tap configuration
pub mod config;

/// Prometheus metrics
pub mod metrics;

/// Record output writers
pub mod output;

/// Record schema declarations
pub mod schema;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Bookmark state stores
pub mod state;

/// Stream definitions and response parsers
pub mod streams;

/// Pagination and the partitioned sync loop
pub mod sync;

// Re-export commonly used types
pub use config::TapConfig;

/// One sync partition: a single configured coin id.
///
/// Every stream that fetches per-coin data keeps an independent bookmark per
/// partition, keyed by the coin id under the stream's state namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    /// CoinGecko coin id (e.g. "bitcoin", "ethereum")
    pub token: String,
}

impl Partition {
    /// Create a partition for a coin id
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Validate the coin id
    pub fn validate(&self) -> Result<(), String> {
        if self.token.is_empty() {
            return Err("Coin id cannot be empty".to_string());
        }

        if self.token.chars().any(|c| c.is_whitespace()) {
            return Err(format!("Coin id cannot contain whitespace: {:?}", self.token));
        }

        if self.token.contains('/') {
            return Err(format!("Coin id cannot contain '/': {:?}", self.token));
        }

        Ok(())
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)
    }
}

/// The representation a stream uses for its replication position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorKind {
    /// Calendar date (UTC), serialized as `YYYY-MM-DD`
    #[serde(rename = "date")]
    Date,
    /// Epoch timestamp in milliseconds, serialized as an integer
    #[serde(rename = "millis")]
    Millis,
}

impl std::fmt::Display for CursorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CursorKind::Date => "date",
            CursorKind::Millis => "millis",
        };
        write!(f, "{s}")
    }
}

/// A replication position: either a calendar date or an epoch-ms timestamp.
///
/// Page tokens, signposts, and bookmarks are all cursor values. Values of
/// different kinds never compare; mixing them is a programming error that
/// surfaces as a pagination failure rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorValue {
    /// Calendar date position (daily streams)
    Date(NaiveDate),
    /// Epoch-millisecond position (hourly streams)
    Millis(i64),
}

impl CursorValue {
    /// The kind of this cursor value
    pub fn kind(&self) -> CursorKind {
        match self {
            CursorValue::Date(_) => CursorKind::Date,
            CursorValue::Millis(_) => CursorKind::Millis,
        }
    }

    /// Compare two cursor values of the same kind.
    ///
    /// Returns `None` when the kinds differ.
    pub fn compare(&self, other: &CursorValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (CursorValue::Date(a), CursorValue::Date(b)) => Some(a.cmp(b)),
            (CursorValue::Millis(a), CursorValue::Millis(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Advance this value by a page step.
    ///
    /// Returns `None` on kind mismatch or date/integer overflow.
    pub fn advance(&self, step: &PageStep) -> Option<CursorValue> {
        match (self, step) {
            (CursorValue::Date(d), PageStep::Days(n)) => d
                .checked_add_days(chrono::Days::new(u64::from(*n)))
                .map(CursorValue::Date),
            (CursorValue::Millis(ms), PageStep::EpochChunkMs(chunk)) => {
                ms.checked_add(*chunk).map(CursorValue::Millis)
            }
            _ => None,
        }
    }

    /// The smaller of two same-kind values.
    ///
    /// Returns `None` when the kinds differ.
    pub fn clamp_to(&self, ceiling: &CursorValue) -> Option<CursorValue> {
        match self.compare(ceiling)? {
            std::cmp::Ordering::Greater => Some(*ceiling),
            _ => Some(*self),
        }
    }

    /// Serialize to the state-file representation: `"YYYY-MM-DD"` strings for
    /// dates, plain integers for epoch milliseconds.
    pub fn to_state_value(&self) -> serde_json::Value {
        match self {
            CursorValue::Date(d) => {
                serde_json::Value::String(d.format("%Y-%m-%d").to_string())
            }
            CursorValue::Millis(ms) => serde_json::Value::Number((*ms).into()),
        }
    }

    /// Parse a state-file representation back into a cursor value of the
    /// expected kind.
    pub fn from_state_value(
        kind: CursorKind,
        value: &serde_json::Value,
    ) -> Result<Self, String> {
        match kind {
            CursorKind::Date => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("Expected date string, got {value}"))?;
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|e| format!("Invalid bookmark date {s:?}: {e}"))?;
                Ok(CursorValue::Date(date))
            }
            CursorKind::Millis => {
                let ms = value
                    .as_i64()
                    .ok_or_else(|| format!("Expected integer timestamp, got {value}"))?;
                if ms < 0 {
                    return Err(format!("Bookmark timestamp must be non-negative, got {ms}"));
                }
                Ok(CursorValue::Millis(ms))
            }
        }
    }
}

impl std::fmt::Display for CursorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CursorValue::Millis(ms) => write!(f, "{ms}"),
        }
    }
}

impl FromStr for CursorValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(CursorValue::Date(date));
        }
        if let Ok(ms) = s.parse::<i64>() {
            return Ok(CursorValue::Millis(ms));
        }
        Err(format!("Invalid cursor value: {s}"))
    }
}

/// Distance between consecutive page tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStep {
    /// Advance a fixed number of calendar days (daily history uses 1)
    Days(u32),
    /// Advance a bounded epoch-millisecond chunk, clamped to the signpost
    /// (hourly backfills use 30 days)
    EpochChunkMs(i64),
}

impl PageStep {
    /// The cursor kind this step applies to
    pub fn cursor_kind(&self) -> CursorKind {
        match self {
            PageStep::Days(_) => CursorKind::Date,
            PageStep::EpochChunkMs(_) => CursorKind::Millis,
        }
    }
}

impl std::fmt::Display for PageStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStep::Days(n) => write!(f, "{n}d"),
            PageStep::EpochChunkMs(ms) => write!(f, "{ms}ms"),
        }
    }
}
