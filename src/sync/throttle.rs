//! Tier-aware request pacing
//!
//! The public tier enforces an aggressive per-minute quota, so the sync loop
//! sleeps a configured number of seconds between consecutive requests. The
//! pro tier never sleeps locally; it declares a concurrency envelope for an
//! orchestrator to enforce instead.

use std::time::Duration;

use tracing::debug;

use crate::client::{ApiTierProfile, ConcurrencyEnvelope};

/// Pacing policy derived from the API tier
#[derive(Debug, Clone)]
pub struct Throttle {
    paced: bool,
    wait: Duration,
    envelope: Option<ConcurrencyEnvelope>,
}

impl Throttle {
    /// Build from a tier profile and the configured wait
    pub fn from_profile(profile: &ApiTierProfile, wait_seconds: u64) -> Self {
        Self {
            paced: profile.paced,
            wait: Duration::from_secs(wait_seconds),
            envelope: profile.envelope,
        }
    }

    /// Whether consecutive requests are separated by a blocking wait
    pub fn is_paced(&self) -> bool {
        self.paced
    }

    /// The wait inserted between requests, `None` when unpaced
    pub fn wait_duration(&self) -> Option<Duration> {
        if self.paced {
            Some(self.wait)
        } else {
            None
        }
    }

    /// Concurrency envelope declared to the harness, pro tier only
    pub fn concurrency_envelope(&self) -> Option<ConcurrencyEnvelope> {
        self.envelope
    }

    /// Sleep between consecutive requests on paced tiers; no-op otherwise.
    ///
    /// Callers invoke this before every request except the first of a run,
    /// so a run of N requests observes exactly N-1 waits.
    pub async fn wait(&self) {
        if self.paced && !self.wait.is_zero() {
            debug!(wait_secs = self.wait.as_secs(), "Pacing before next request");
            tokio::time::sleep(self.wait).await;
        }
    }
}
