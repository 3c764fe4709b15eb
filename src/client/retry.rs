//! Retry policy with exponential backoff
//!
//! Wraps the transport primitive. Only whitelisted transient failures are
//! retried (see [`ClientError::is_transient`]); everything else propagates
//! on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::client::{ClientError, ClientResult};

/// Maximum number of attempts (first try included).
/// Eight attempts rides out CoinGecko's per-minute quota resets without
/// hammering a genuinely degraded API.
pub const MAX_ATTEMPTS: u32 = 8;

/// Initial backoff delay in milliseconds.
/// The public tier quota is per-minute, so the first wait is already seconds
/// long rather than sub-second.
pub const INITIAL_BACKOFF_MS: u64 = 3_000;

/// Maximum backoff delay in milliseconds.
/// Two minutes caps the doubling so a long outage fails within a bounded
/// window instead of stalling the sync for hours.
pub const MAX_BACKOFF_MS: u64 = 120_000;

/// Calculate exponential backoff delay for a zero-indexed attempt
pub fn calculate_backoff(attempt: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Retry policy applied to every API request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for the doubled delays
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds (tests use millisecond delays)
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    /// Backoff delay for a zero-indexed attempt under this policy
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial_backoff.as_millis() as u64;
        let delay_ms = initial_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_backoff.as_millis() as u64))
    }

    /// Run `op` until it succeeds, a non-transient error occurs, or attempts
    /// are exhausted. On exhaustion the last transient error propagates.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let backoff = self.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient API error, backing off"
                    );
                    crate::metrics::record_retry(attempt + 1);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Convenience check used by callers that route errors themselves
pub fn is_retriable(error: &ClientError) -> bool {
    error.is_transient()
}
