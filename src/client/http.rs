//! CoinGecko HTTP client
//!
//! Provides the reqwest-backed transport and the tier-aware client used by
//! every stream:
//! - Transport performs one GET and classifies the outcome
//! - Client renders the tier base URL and auth header, then applies the
//!   retry policy around the transport

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::client::shared::global_http_client;
use crate::client::tier::{ApiTier, ApiTierProfile};
use crate::client::{ApiTransport, ClientError, ClientResult, RetryPolicy};

/// Map a non-success status to its error classification.
///
/// Returns `None` for success statuses. The mapping decides retry behavior:
/// 429 and 5xx are transient, 404 is a soft skip, everything else fails the
/// partition immediately.
fn error_for_status(status: StatusCode, resource: &str, body: String) -> Option<ClientError> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    Some(match code {
        429 => ClientError::RateLimited,
        404 => ClientError::NotFound {
            resource: resource.to_string(),
        },
        401 | 403 => ClientError::Unauthorized { status: code, body },
        _ if status.is_server_error() => ClientError::ServerError { status: code },
        _ => ClientError::ClientStatus { status: code, body },
    })
}

/// Reqwest-backed transport: one GET per call, no retry or pacing
pub struct HttpTransport {
    client: Arc<Client>,
}

impl HttpTransport {
    /// Create a transport over the shared global client
    pub fn shared() -> Self {
        Self {
            client: global_http_client(),
        }
    }

    /// Create a transport over an explicit client (contract tests)
    pub fn with_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn resource_path(url: &str) -> String {
        match reqwest::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.to_string(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::shared()
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> ClientResult<Value> {
        let resource = Self::resource_path(url);
        let started = Instant::now();

        let mut request = self.client.get(url).query(params);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| {
            crate::metrics::record_request(&resource, "network_error", started.elapsed());
            if e.is_timeout() {
                ClientError::Timeout(e.to_string())
            } else if e.is_connect() {
                ClientError::Connect(e.to_string())
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        crate::metrics::record_request(&resource, status.as_str(), started.elapsed());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            // error_for_status returns Some for every non-success status
            if let Some(err) = error_for_status(status, &resource, body) {
                return Err(err);
            }
            unreachable!("error_for_status returns Some for every non-success status");
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to decode response body: {e}")))
    }
}

/// Tier-aware CoinGecko client used by every stream sync
pub struct CoinGeckoClient {
    transport: Arc<dyn ApiTransport>,
    profile: &'static ApiTierProfile,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl CoinGeckoClient {
    /// Create a client for a tier over the shared transport
    pub fn new(tier: ApiTier, api_key: Option<String>, retry: RetryPolicy) -> Self {
        Self::with_transport(Arc::new(HttpTransport::shared()), tier, api_key, retry)
    }

    /// Create a client with an injected transport (tests script responses
    /// through this seam)
    pub fn with_transport(
        transport: Arc<dyn ApiTransport>,
        tier: ApiTier,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            profile: tier.profile(),
            api_key,
            retry,
        }
    }

    /// The tier profile this client requests against
    pub fn profile(&self) -> &'static ApiTierProfile {
        self.profile
    }

    /// Auth headers for this client.
    ///
    /// The header is only attached when a key is configured; the public tier
    /// works unauthenticated.
    pub fn auth_headers(&self) -> Vec<(&'static str, String)> {
        match &self.api_key {
            Some(key) => vec![(self.profile.auth_header, key.clone())],
            None => Vec::new(),
        }
    }

    /// Execute a GET against a tier-relative path with the retry policy
    /// applied.
    ///
    /// # Arguments
    /// * `path` - API path (e.g. "/coins/bitcoin/history")
    /// * `params` - Query parameters as key-value pairs
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> ClientResult<Value> {
        let url = format!("{}{}", self.profile.base_url, path);
        let headers = self.auth_headers();

        debug!("GET {} with {} params", url, params.len());

        self.retry
            .run(|| self.transport.get_json(&url, params, &headers))
            .await
    }
}
