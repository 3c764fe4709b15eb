//! Shared test support: scripted transports, capture buffers and config
//! builders used across the integration suite.

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coingecko_extractor::client::{
    ApiTier, ApiTransport, ClientError, ClientResult, CoinGeckoClient, RetryPolicy,
};
use coingecko_extractor::shutdown::SharedShutdown;
use coingecko_extractor::TapConfig;

/// One request observed by a [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport double that replays a script of responses and records every
/// request it sees.
///
/// Responses are consumed front to back; once the script is exhausted the
/// fallback body (if any) answers every further request. A transport with
/// neither fails loudly so a test that makes more requests than it scripted
/// cannot pass by accident.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ClientResult<Value>>>,
    fallback: Option<Value>,
    calls: Mutex<Vec<RecordedCall>>,
    shutdown_after: Option<(SharedShutdown, usize)>,
}

impl ScriptedTransport {
    /// Answer every request with the same body
    pub fn always(body: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(body),
            calls: Mutex::new(Vec::new()),
            shutdown_after: None,
        }
    }

    /// Answer requests with the given responses in order, then fail
    pub fn sequence(responses: Vec<ClientResult<Value>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
            shutdown_after: None,
        }
    }

    /// Request shutdown as soon as the nth call (1-based) has been served
    pub fn with_shutdown_after(mut self, shutdown: SharedShutdown, calls: usize) -> Self {
        self.shutdown_after = Some((shutdown, calls));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> ClientResult<Value> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                url: url.to_string(),
                params: params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            });
            calls.len()
        };

        if let Some((shutdown, after)) = &self.shutdown_after {
            if call_index >= *after {
                shutdown.request_shutdown();
            }
        }

        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return response;
        }
        match &self.fallback {
            Some(body) => Ok(body.clone()),
            None => Err(ClientError::ClientStatus {
                status: 599,
                body: "scripted responses exhausted".to_string(),
            }),
        }
    }
}

/// In-memory sink for the JSONL writer, readable back as parsed lines
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn lines(&self) -> Vec<Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8(buf.clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Retry policy with millisecond backoffs so retry paths run fast
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(8, Duration::from_millis(1), Duration::from_millis(2))
}

/// Public-tier client over a scripted transport
pub fn scripted_client(transport: Arc<ScriptedTransport>) -> CoinGeckoClient {
    scripted_client_for(transport, ApiTier::Public, None, fast_retry())
}

/// Client over a scripted transport with explicit tier, key and retry policy
pub fn scripted_client_for(
    transport: Arc<ScriptedTransport>,
    tier: ApiTier,
    api_key: Option<&str>,
    retry: RetryPolicy,
) -> CoinGeckoClient {
    CoinGeckoClient::with_transport(transport, tier, api_key.map(str::to_string), retry)
}

fn build_config(
    tokens: &[&str],
    start_date: NaiveDate,
    streams: &[&str],
    wait_seconds: u64,
    pro_key: Option<&str>,
) -> TapConfig {
    let mut doc = json!({
        "token": tokens,
        "start_date": start_date.format("%Y-%m-%d").to_string(),
        "streams": streams,
        "wait_time_between_requests": wait_seconds,
    });
    if let Some(key) = pro_key {
        doc["api_url"] = json!("https://pro-api.coingecko.com/api/v3");
        doc["api_key"] = json!(key);
    }
    TapConfig::from_json(&doc.to_string()).expect("test config is valid")
}

/// Public-tier config with pacing disabled, so tests never sleep
pub fn tap_config(tokens: &[&str], start_date: NaiveDate, streams: &[&str]) -> TapConfig {
    build_config(tokens, start_date, streams, 0, None)
}

/// Public-tier config with an explicit inter-request wait
pub fn paced_config(
    tokens: &[&str],
    start_date: NaiveDate,
    streams: &[&str],
    wait_seconds: u64,
) -> TapConfig {
    build_config(tokens, start_date, streams, wait_seconds, None)
}

/// Pro-tier config with a test API key and an explicit (ignored) wait
pub fn pro_config(
    tokens: &[&str],
    start_date: NaiveDate,
    streams: &[&str],
    wait_seconds: u64,
) -> TapConfig {
    build_config(tokens, start_date, streams, wait_seconds, Some("CG-test-key"))
}

/// The UTC date `days` days ago
pub fn days_ago(days: u64) -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(days))
        .unwrap()
}

/// Yesterday's UTC date, the signpost for daily streams
pub fn yesterday() -> NaiveDate {
    days_ago(1)
}

/// A realistic `/coins/{id}/history` response body
pub fn history_body() -> Value {
    json!({
        "id": "bitcoin",
        "symbol": "btc",
        "name": "Bitcoin",
        "market_data": {
            "current_price": { "usd": 43_250.12, "btc": 1.0, "eth": 18.94 },
            "market_cap": { "usd": 847_000_000_000.0 },
            "total_volume": { "usd": 21_300_000_000.0 }
        },
        "community_data": {
            "twitter_followers": 6_500_000,
            "reddit_average_posts_48h": 7.4
        }
    })
}

/// A trimmed-down `/coins/{id}` profile response body
pub fn profile_body() -> Value {
    json!({
        "id": "bitcoin",
        "symbol": "btc",
        "name": "Bitcoin",
        "categories": ["Cryptocurrency", "Layer 1 (L1)"],
        "market_cap_rank": 1,
        "sentiment_votes_up_percentage": 84.5,
        "community_data": { "twitter_followers": 6_500_000 },
        "developer_data": { "forks": 36_000, "stars": 73_000 }
    })
}

/// A `/search/trending` response body with two ranked coins
pub fn trending_body() -> Value {
    json!({
        "coins": [
            { "item": { "id": "pepe", "name": "Pepe", "symbol": "PEPE", "market_cap_rank": 38 } },
            { "item": { "id": "sui", "name": "Sui", "symbol": "SUI", "market_cap_rank": 15 } }
        ]
    })
}
