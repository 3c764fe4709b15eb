//! CoinGecko HTTP client layer
//!
//! Splits the request path into three pieces: a transport primitive that
//! performs one GET and classifies the outcome, a retry policy that wraps the
//! primitive with a backoff whitelist, and the tier profiles that decide base
//! URL, auth header, and pacing.

use async_trait::async_trait;
use serde_json::Value;

pub mod http;
pub mod retry;
pub mod shared;
pub mod tier;

pub use http::{CoinGeckoClient, HttpTransport};
pub use retry::RetryPolicy;
pub use tier::{ApiTier, ApiTierProfile, ConcurrencyEnvelope, PRO_TIER, PUBLIC_TIER};

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Read timeout waiting for the API
    #[error("request timed out: {0}")]
    Timeout(String),

    /// TCP/TLS connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Other transport-level failure (not retried)
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429 from the API
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 5xx from the API
    #[error("server error: HTTP {status}")]
    ServerError {
        /// Status code returned by the API
        status: u16,
    },

    /// HTTP 404: the requested resource does not exist
    #[error("not found: {resource}")]
    NotFound {
        /// Path of the missing resource
        resource: String,
    },

    /// HTTP 401/403: key missing, invalid, or not entitled
    #[error("unauthorized (HTTP {status}): {body}")]
    Unauthorized {
        /// Status code returned by the API
        status: u16,
        /// Response body text
        body: String,
    },

    /// Any other non-success status
    #[error("client error HTTP {status}: {body}")]
    ClientStatus {
        /// Status code returned by the API
        status: u16,
        /// Response body text
        body: String,
    },

    /// Response body was not the expected JSON
    #[error("parse error: {0}")]
    Parse(String),
}

impl ClientError {
    /// Whether the retry policy may retry this error.
    ///
    /// The whitelist is closed: read timeouts, connection failures, 429, and
    /// 5xx. Everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout(_)
                | ClientError::Connect(_)
                | ClientError::RateLimited
                | ClientError::ServerError { .. }
        )
    }

    /// Whether this is a 404, which partition syncs treat as a soft skip
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// One-shot request primitive: perform a GET, classify the outcome, decode
/// JSON. No retry, no pacing; those live a layer above.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Execute a GET against `url`, returning the decoded JSON body.
    ///
    /// # Arguments
    /// * `url` - Absolute URL including the tier base
    /// * `params` - Query parameters as key-value pairs
    /// * `headers` - Extra request headers (auth)
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> ClientResult<Value>;
}
