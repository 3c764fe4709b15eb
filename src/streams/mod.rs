//! Stream definitions and response parsers
//!
//! Each stream describes one CoinGecko endpoint family: where to fetch
//! (`path`/`query`), how the sync loop drives it (`mode`), and how raw
//! response bodies become flat output records (`parse_page`). Streams hold no
//! mutable sync state; the partition and page token are threaded through every
//! call so the same instance serves every configured coin.

mod categories;
mod coins_list;
mod daily;
mod discovery;
mod hourly;
mod intelligence;
mod profile;

pub use categories::TokenCategoriesStream;
pub use coins_list::CoinsListStream;
pub use daily::TokenHistoryStream;
pub use discovery::{NewListingsStream, TopMoversStream};
pub use hourly::TokenHourlyStream;
pub use intelligence::{DerivativesStream, TrendingStream};
pub use profile::AssetProfileStream;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::client::ApiTier;
use crate::config::{ConfigError, ConfigResult, TapConfig};
use crate::schema::RecordSchema;
use crate::{CursorValue, PageStep, Partition};

/// A single flattened output record
pub type Record = serde_json::Map<String, Value>;

/// Response parsing errors.
///
/// A parse failure fails the whole page; no partial page is ever emitted.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A field the stream cannot shape records without is absent
    #[error("{stream}: response missing field {field:?}")]
    MissingField {
        /// Stream that was parsing
        stream: &'static str,
        /// Field that was expected
        field: &'static str,
    },

    /// The response body does not have the documented structure
    #[error("{stream}: unexpected response shape: {detail}")]
    UnexpectedShape {
        /// Stream that was parsing
        stream: &'static str,
        /// What did not match
        detail: String,
    },
}

/// Result type for response parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// How a stream's records replicate downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replication {
    /// Bookmarked on a cursor field; resumable across runs
    Incremental {
        /// Record field the bookmark tracks
        key: &'static str,
    },
    /// Re-fetched in full every run; never bookmarked
    FullTable,
}

impl Replication {
    /// The bookmark field, when incremental
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Replication::Incremental { key } => Some(key),
            Replication::FullTable => None,
        }
    }
}

/// How the sync loop drives a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// One request per page token, advancing by `step` until the signpost
    CursorPaginated {
        /// Distance between consecutive page tokens
        step: PageStep,
    },
    /// One request per partition per run
    PartitionSnapshot {
        /// Skip partitions already captured for the current UTC date
        once_per_day: bool,
    },
    /// One un-partitioned request per run
    GlobalSnapshot,
}

/// One CoinGecko endpoint family.
///
/// Implementations are cheap, immutable descriptions; everything that varies
/// per request arrives as an argument.
pub trait RestStream: std::fmt::Debug + Send + Sync {
    /// Stream name, also the state namespace
    fn name(&self) -> &'static str;

    /// Primary key fields of the output records
    fn primary_keys(&self) -> &'static [&'static str];

    /// Replication method and bookmark field
    fn replication(&self) -> Replication;

    /// How the sync loop drives this stream
    fn mode(&self) -> SyncMode;

    /// Declared shape of the output records
    fn schema(&self) -> RecordSchema;

    /// Endpoint path relative to the API base URL
    fn path(&self, partition: Option<&Partition>) -> String;

    /// Query parameters for one request
    fn query(&self, token: Option<&CursorValue>) -> Vec<(&'static str, String)>;

    /// Cursor to fall back to when a partition has no bookmark yet.
    ///
    /// `None` for streams that are not cursor-paginated.
    fn start_cursor(&self) -> Option<CursorValue> {
        None
    }

    /// Inclusive ceiling for cursor advancement.
    ///
    /// The sync loop snapshots this once per partition; it never moves during
    /// a partition sync.
    fn signpost(&self) -> CursorValue;

    /// Shape one response body into records.
    ///
    /// `token` is the page token the request was issued with (for snapshot
    /// streams, the signpost). All records parse or the page fails.
    fn parse_page(
        &self,
        partition: Option<&Partition>,
        token: Option<&CursorValue>,
        body: &Value,
    ) -> ParseResult<Vec<Record>>;

    /// Whether the stream fans out over the configured coin partitions
    fn partitioned(&self) -> bool {
        !matches!(self.mode(), SyncMode::GlobalSnapshot)
    }
}

/// Static stream description for discovery listings
#[derive(Debug, Clone, Copy)]
pub struct StreamInfo {
    /// Stream name
    pub name: &'static str,
    /// Sync mode label
    pub mode: &'static str,
    /// Cursor field label, `-` when full-table
    pub cursor: &'static str,
    /// Extra requirement label, empty when none
    pub requires: &'static str,
}

/// Every stream this tap can serve, in canonical sync order
pub const STREAM_CATALOG: &[StreamInfo] = &[
    StreamInfo {
        name: daily::STREAM_NAME,
        mode: "cursor-paginated (1 day)",
        cursor: "date",
        requires: "",
    },
    StreamInfo {
        name: hourly::STREAM_NAME,
        mode: "cursor-paginated (epoch chunks)",
        cursor: "timestamp",
        requires: "",
    },
    StreamInfo {
        name: categories::STREAM_NAME,
        mode: "partition snapshot",
        cursor: "-",
        requires: "",
    },
    StreamInfo {
        name: profile::STREAM_NAME,
        mode: "partition snapshot (daily)",
        cursor: "snapshot_date",
        requires: "",
    },
    StreamInfo {
        name: coins_list::STREAM_NAME,
        mode: "global snapshot",
        cursor: "-",
        requires: "api_key",
    },
    StreamInfo {
        name: intelligence::TRENDING_NAME,
        mode: "global snapshot",
        cursor: "-",
        requires: "",
    },
    StreamInfo {
        name: intelligence::DERIVATIVES_NAME,
        mode: "global snapshot",
        cursor: "-",
        requires: "",
    },
    StreamInfo {
        name: discovery::NEW_LISTINGS_NAME,
        mode: "global snapshot",
        cursor: "-",
        requires: "pro tier",
    },
    StreamInfo {
        name: discovery::TOP_MOVERS_NAME,
        mode: "global snapshot",
        cursor: "-",
        requires: "pro tier",
    },
];

/// Build the streams a config can sync, in canonical order.
///
/// Without an explicit `streams` selection, every stream the tier and key can
/// serve is included and the rest are skipped with a debug log. An explicit
/// selection naming an unknown or unavailable stream is a config error.
pub fn build_streams(config: &TapConfig) -> ConfigResult<Vec<Arc<dyn RestStream>>> {
    let tier = config.tier()?;
    let has_key = config.api_key.is_some();

    if let Some(names) = &config.streams {
        for name in names {
            if !STREAM_CATALOG.iter().any(|info| info.name == name) {
                return Err(ConfigError::UnknownStream(name.clone()));
            }
        }
    }

    let wants = |name: &str| {
        config
            .streams
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == name))
    };
    let explicit = |name: &str| {
        config
            .streams
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == name))
    };

    let mut streams: Vec<Arc<dyn RestStream>> = Vec::new();

    if wants(daily::STREAM_NAME) {
        streams.push(Arc::new(TokenHistoryStream::from_config(config)?));
    }
    if wants(hourly::STREAM_NAME) {
        streams.push(Arc::new(TokenHourlyStream::from_config(config)?));
    }
    if wants(categories::STREAM_NAME) {
        streams.push(Arc::new(TokenCategoriesStream::new()));
    }
    if wants(profile::STREAM_NAME) {
        streams.push(Arc::new(AssetProfileStream::new()));
    }

    if wants(coins_list::STREAM_NAME) {
        if has_key {
            streams.push(Arc::new(CoinsListStream::new()));
        } else if explicit(coins_list::STREAM_NAME) {
            return Err(ConfigError::UnavailableStream {
                stream: coins_list::STREAM_NAME,
                detail: "an api_key is required".to_string(),
            });
        } else {
            debug!(
                stream = coins_list::STREAM_NAME,
                "Skipping stream: no api_key configured"
            );
        }
    }

    if wants(intelligence::TRENDING_NAME) {
        streams.push(Arc::new(TrendingStream::new()));
    }
    if wants(intelligence::DERIVATIVES_NAME) {
        streams.push(Arc::new(DerivativesStream::new()));
    }

    for name in [discovery::NEW_LISTINGS_NAME, discovery::TOP_MOVERS_NAME] {
        if !wants(name) {
            continue;
        }
        if tier != ApiTier::Pro {
            if explicit(name) {
                return Err(ConfigError::UnavailableStream {
                    stream: name,
                    detail: "requires the pro API tier".to_string(),
                });
            }
            debug!(stream = name, "Skipping stream: requires the pro API tier");
            continue;
        }
        if name == discovery::NEW_LISTINGS_NAME {
            streams.push(Arc::new(NewListingsStream::new()));
        } else {
            streams.push(Arc::new(TopMoversStream::new(config.vs_currency.clone())));
        }
    }

    Ok(streams)
}

/// Current UTC date
pub(crate) fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Yesterday's UTC date
pub(crate) fn yesterday_utc() -> NaiveDate {
    today_utc()
        .checked_sub_days(chrono::Days::new(1))
        .unwrap_or(NaiveDate::MIN)
}

/// Current epoch timestamp in milliseconds
pub(crate) fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format an epoch-ms timestamp as RFC 3339
pub(crate) fn rfc3339_from_ms(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339())
}

/// Navigate into a body, treating JSON null the same as absent
pub(crate) fn value_at<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = body;
    for key in path {
        current = current.get(key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

pub(crate) fn number_at(body: &Value, path: &[&str]) -> Option<f64> {
    value_at(body, path)?.as_f64()
}

pub(crate) fn integer_at(body: &Value, path: &[&str]) -> Option<i64> {
    value_at(body, path)?.as_i64()
}

pub(crate) fn string_at(body: &Value, path: &[&str]) -> Option<String> {
    value_at(body, path)?.as_str().map(str::to_string)
}

/// Collect an array of strings, dropping non-string entries
pub(crate) fn string_array_at(body: &Value, path: &[&str]) -> Option<Vec<String>> {
    let items = value_at(body, path)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}

/// Serialize a typed record into the output map shape
pub(crate) fn to_record<T: serde::Serialize>(
    stream: &'static str,
    value: &T,
) -> ParseResult<Record> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::UnexpectedShape {
            stream,
            detail: format!("record serialized to non-object value: {other}"),
        }),
        Err(e) => Err(ParseError::UnexpectedShape {
            stream,
            detail: format!("record serialization failed: {e}"),
        }),
    }
}

/// The partition argument, or a parse error for streams that need one
pub(crate) fn require_partition<'a>(
    stream: &'static str,
    partition: Option<&'a Partition>,
) -> ParseResult<&'a Partition> {
    partition.ok_or(ParseError::UnexpectedShape {
        stream,
        detail: "stream is partitioned but no partition was given".to_string(),
    })
}
