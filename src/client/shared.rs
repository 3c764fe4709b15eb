//! Process-wide HTTP client
//!
//! Every transport borrows the same lazily built `reqwest::Client`, so a
//! whole run shares one connection pool and TLS session cache no matter how
//! many streams and partitions it syncs.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Time allowed to establish the TCP connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ceiling for one whole request, response body included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            panic!("FATAL: cannot build HTTP client: {e}. Check system TLS configuration.")
        });
    Arc::new(client)
});

/// Handle to the shared client; cloning only bumps a reference count
pub fn global_http_client() -> Arc<Client> {
    Arc::clone(&HTTP_CLIENT)
}
