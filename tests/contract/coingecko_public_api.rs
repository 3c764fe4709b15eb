//! Contract tests for the CoinGecko public API.
//!
//! These verify the live response shapes the parsers rely on. They hit the
//! real public tier, which rate-limits aggressively, so they are ignored by
//! default; run them with `cargo test -- --ignored`.

use reqwest;
use serde_json::Value;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Contract test for the daily history endpoint (/coins/{id}/history)
#[tokio::test]
#[ignore] // Hits the live public API; run explicitly with --ignored
async fn test_history_endpoint_contract() {
    let client = reqwest::Client::new();

    // A fixed historical date keeps the response stable across runs
    let url = format!("{BASE_URL}/coins/bitcoin/history");
    let params = [("date", "30-12-2023"), ("localization", "false")];

    let response = client
        .get(&url)
        .query(&params)
        .send()
        .await
        .expect("Failed to send request to CoinGecko API");

    assert!(
        response.status().is_success(),
        "Expected successful response, got: {}",
        response.status()
    );

    let body: Value = response
        .json()
        .await
        .expect("Failed to parse JSON response");

    assert!(body.is_object(), "Response should be an object");
    assert_eq!(body["id"], "bitcoin");
    assert_eq!(body["symbol"], "btc");

    // The flattened record pulls prices from market_data.current_price
    let price = body["market_data"]["current_price"]["usd"]
        .as_f64()
        .expect("current_price.usd should be a number");
    assert!(price > 0.0, "Historical BTC price should be positive");

    assert!(
        body["market_data"]["market_cap"]["usd"].is_number(),
        "market_cap.usd should be a number"
    );
    assert!(
        body.get("community_data").is_some(),
        "Response should contain 'community_data'"
    );
}

/// Contract test for the trending endpoint (/search/trending)
#[tokio::test]
#[ignore] // Hits the live public API; run explicitly with --ignored
async fn test_trending_endpoint_contract() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{BASE_URL}/search/trending"))
        .send()
        .await
        .expect("Failed to send request to CoinGecko API");

    assert!(
        response.status().is_success(),
        "Expected successful response, got: {}",
        response.status()
    );

    let body: Value = response
        .json()
        .await
        .expect("Failed to parse JSON response");

    let coins = body["coins"]
        .as_array()
        .expect("Response should contain a 'coins' array");
    assert!(!coins.is_empty(), "Trending list should not be empty");

    // Each entry wraps the coin under an "item" key; the parser depends on
    // this nesting
    let first = &coins[0];
    assert!(
        first.get("item").is_some(),
        "Each trending entry should wrap an 'item' object"
    );
    assert!(
        first["item"]["id"].is_string(),
        "item.id should be a string"
    );
    assert!(
        first["item"]["symbol"].is_string(),
        "item.symbol should be a string"
    );
}

/// Contract test for the coin profile endpoint (/coins/{id})
#[tokio::test]
#[ignore] // Hits the live public API; run explicitly with --ignored
async fn test_coin_profile_endpoint_contract() {
    let client = reqwest::Client::new();

    let url = format!("{BASE_URL}/coins/bitcoin");
    let params = [
        ("localization", "false"),
        ("tickers", "false"),
        ("market_data", "true"),
        ("community_data", "true"),
        ("developer_data", "true"),
        ("sparkline", "false"),
    ];

    let response = client
        .get(&url)
        .query(&params)
        .send()
        .await
        .expect("Failed to send request to CoinGecko API");

    assert!(
        response.status().is_success(),
        "Expected successful response, got: {}",
        response.status()
    );

    let body: Value = response
        .json()
        .await
        .expect("Failed to parse JSON response");

    assert_eq!(body["id"], "bitcoin");
    assert!(
        body["market_cap_rank"].is_number(),
        "market_cap_rank should be a number"
    );
    assert!(
        body["categories"].is_array(),
        "categories should be an array"
    );
    assert!(
        body["community_data"].is_object(),
        "community_data pane should be present when requested"
    );
    assert!(
        body["developer_data"].is_object(),
        "developer_data pane should be present when requested"
    );
}

/// Contract test for the derivatives endpoint (/derivatives)
#[tokio::test]
#[ignore] // Hits the live public API; run explicitly with --ignored
async fn test_derivatives_endpoint_contract() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{BASE_URL}/derivatives"))
        .query(&[("include_tickers", "all")])
        .send()
        .await
        .expect("Failed to send request to CoinGecko API");

    assert!(
        response.status().is_success(),
        "Expected successful response, got: {}",
        response.status()
    );

    let body: Value = response
        .json()
        .await
        .expect("Failed to parse JSON response");

    let tickers = body.as_array().expect("Response should be an array");
    assert!(!tickers.is_empty(), "Derivatives list should not be empty");

    let first = &tickers[0];
    assert!(first["market"].is_string(), "market should be a string");
    assert!(first["symbol"].is_string(), "symbol should be a string");
    // This endpoint quotes prices as strings
    if let Some(price) = first.get("price").filter(|p| !p.is_null()) {
        assert!(price.is_string(), "price should be a string, got: {price:?}");
    }
}

/// Unknown coin ids must come back as 404, which partition syncs skip
#[tokio::test]
#[ignore] // Hits the live public API; run explicitly with --ignored
async fn test_missing_coin_returns_404() {
    let client = reqwest::Client::new();

    let url = format!("{BASE_URL}/coins/this-coin-does-not-exist-xyz/history");
    let response = client
        .get(&url)
        .query(&[("date", "30-12-2023"), ("localization", "false")])
        .send()
        .await
        .expect("Failed to send request to CoinGecko API");

    assert_eq!(
        response.status().as_u16(),
        404,
        "Unknown coins should return 404, got: {}",
        response.status()
    );
}
