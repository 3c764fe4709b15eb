//! Observability metrics for the extractor
//!
//! Counts API traffic, retries, emitted records and partition outcomes so a
//! long-running sync can be watched from Prometheus.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for the scrape endpoint (`--metrics-addr`)
//! - Recording is a no-op until [`init_metrics`] installs the exporter, so
//!   library use without an exporter costs nothing

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize the metrics system with a Prometheus exporter.
///
/// Called once at startup when a scrape address is configured. The function
/// is idempotent and will not reinitialize if already called.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "api_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the CoinGecko API"
    );

    describe_counter!(
        "api_rate_limited_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );

    describe_counter!(
        "api_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );

    describe_histogram!(
        "api_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_counter!(
        "records_emitted_total",
        Unit::Count,
        "Total number of records emitted to the output sink"
    );

    describe_counter!(
        "partitions_synced_total",
        Unit::Count,
        "Partition syncs finished, labeled by outcome"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Record one API request with its status and timing.
///
/// `status` is the HTTP status code as a string, or `"network_error"` when
/// no response arrived.
pub fn record_request(resource: &str, status: &str, duration: Duration) {
    counter!(
        "api_requests_total",
        "resource" => resource.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);

    histogram!(
        "api_request_duration_seconds",
        "resource" => resource.to_string(),
    )
    .record(duration.as_secs_f64());

    if status == "429" {
        counter!(
            "api_rate_limited_total",
            "resource" => resource.to_string(),
        )
        .increment(1);
    }
}

/// Record one retry attempt
pub fn record_retry(attempt: u32) {
    counter!(
        "api_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);
}

/// Record records emitted for a stream
pub fn record_records_emitted(stream: &str, count: u64) {
    counter!(
        "records_emitted_total",
        "stream" => stream.to_string(),
    )
    .increment(count);
}

/// Record a finished partition sync with its outcome label
pub fn record_partition_outcome(stream: &str, outcome: &str) {
    counter!(
        "partitions_synced_total",
        "stream" => stream.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

/// Check if the metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
