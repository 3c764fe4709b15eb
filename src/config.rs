//! Tap configuration
//!
//! Configuration is a single JSON document, deserialized with serde. Field
//! names follow the conventions of the connector family this tap belongs to
//! (`token`, `api_url`, `start_date`, `wait_time_between_requests`), so an
//! existing deployment can reuse its config file unchanged.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::client::ApiTier;
use crate::Partition;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {detail}")]
    Read {
        /// Path that was attempted
        path: String,
        /// Underlying I/O error
        detail: String,
    },

    /// Config file is not valid JSON or has wrong field types
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// `api_url` does not match a known API tier
    #[error("unrecognized api_url: {0}")]
    UnknownApiUrl(String),

    /// No tokens configured
    #[error("at least one token must be configured")]
    NoTokens,

    /// A configured token id is not usable as a path segment
    #[error("invalid token {token:?}: {detail}")]
    InvalidToken {
        /// The offending token id
        token: String,
        /// What is wrong with it
        detail: String,
    },

    /// The pro tier requires an API key
    #[error("api_key is required when api_url points at the pro API")]
    MissingApiKey,

    /// A stream needs `start_date` but none is configured
    #[error("start_date is required for stream {stream}")]
    MissingStartDate {
        /// Stream that needs a starting point
        stream: &'static str,
    },

    /// A stream selection names a stream that does not exist
    #[error("unknown stream selected: {0}")]
    UnknownStream(String),

    /// A stream selection names a stream the current tier or key cannot serve
    #[error("stream {stream} is unavailable: {detail}")]
    UnavailableStream {
        /// Stream that was selected
        stream: &'static str,
        /// Why it cannot be synced with this config
        detail: String,
    },

    /// A numeric field is out of its accepted range
    #[error("invalid value for {field}: {detail}")]
    InvalidValue {
        /// Config field name
        field: &'static str,
        /// What is wrong with the value
        detail: String,
    },
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_api_url() -> String {
    crate::client::PUBLIC_TIER.base_url.to_string()
}

fn default_wait_seconds() -> u64 {
    5
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_hourly_chunk_days() -> u32 {
    30
}

/// Tap configuration document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    /// Coin ids to sync, one sync partition each
    #[serde(rename = "token")]
    pub tokens: Vec<String>,

    /// API base URL, selects the tier
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key, sent as the tier's auth header when present
    #[serde(default)]
    pub api_key: Option<String>,

    /// Earliest date to sync when no bookmark exists yet
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Pacing delay between requests on the public tier, in seconds
    #[serde(default = "default_wait_seconds")]
    pub wait_time_between_requests: u64,

    /// Quote currency for price streams
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// Explicit data interval for the hourly chart endpoint, when supported
    /// by the plan (e.g. `"hourly"`)
    #[serde(default)]
    pub interval: Option<String>,

    /// Decimal precision requested from the hourly chart endpoint
    #[serde(default)]
    pub precision: Option<String>,

    /// Window size for the hourly chart stream, in days per request
    #[serde(default = "default_hourly_chunk_days")]
    pub hourly_chunk_days: u32,

    /// Streams to sync; `None` selects every stream this config can serve
    #[serde(default)]
    pub streams: Option<Vec<String>>,
}

impl TapConfig {
    /// Load and validate a config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a config document from a JSON string
    pub fn from_json(raw: &str) -> ConfigResult<Self> {
        let config: TapConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values and cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        let tier = self.tier()?;

        if self.tokens.is_empty() {
            return Err(ConfigError::NoTokens);
        }
        for token in &self.tokens {
            Partition::new(token)
                .validate()
                .map_err(|detail| ConfigError::InvalidToken {
                    token: token.clone(),
                    detail,
                })?;
        }

        if tier == ApiTier::Pro && self.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.vs_currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "vs_currency",
                detail: "must not be empty".to_string(),
            });
        }

        if self.hourly_chunk_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hourly_chunk_days",
                detail: "must be at least 1".to_string(),
            });
        }

        if self.wait_time_between_requests > 3_600 {
            return Err(ConfigError::InvalidValue {
                field: "wait_time_between_requests",
                detail: "must be at most 3600 seconds".to_string(),
            });
        }

        Ok(())
    }

    /// Resolve the API tier from `api_url`
    pub fn tier(&self) -> ConfigResult<ApiTier> {
        ApiTier::from_base_url(&self.api_url).map_err(ConfigError::UnknownApiUrl)
    }

    /// The configured tokens as sync partitions
    pub fn partitions(&self) -> Vec<Partition> {
        self.tokens.iter().map(|t| Partition::new(t)).collect()
    }

    /// The configured start date, or an error naming the stream that needs it
    pub fn required_start_date(&self, stream: &'static str) -> ConfigResult<NaiveDate> {
        self.start_date
            .ok_or(ConfigError::MissingStartDate { stream })
    }
}
