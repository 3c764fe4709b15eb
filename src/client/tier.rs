//! CoinGecko API tier configuration
//!
//! This module provides configuration profiles for the two CoinGecko API
//! tiers, making pro vs public differences purely configuration rather than
//! code branching.
//!
//! # Tiers
//!
//! - **Pro**: Uses <https://pro-api.coingecko.com/api/v3> with the
//!   `x-cg-pro-api-key` header; no local pacing, declares a concurrency
//!   envelope instead
//! - **Public**: Uses <https://api.coingecko.com/api/v3> with the
//!   `x-cg-demo-api-key` header; paced with a blocking wait between requests

use std::time::Duration;

/// Concurrency envelope the pro tier declares to the surrounding harness.
///
/// The engine itself stays single-worker; these numbers tell an orchestrator
/// how far it may fan out without tripping the account's rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyEnvelope {
    /// Maximum concurrent workers
    pub concurrency: u32,
    /// Maximum requests per rolling window
    pub max_requests_per_window: u32,
    /// Rolling window size
    pub window: Duration,
}

/// Configuration for one CoinGecko API tier
#[derive(Debug, Clone)]
pub struct ApiTierProfile {
    /// Base URL for API requests
    pub base_url: &'static str,

    /// Header name carrying the API key
    pub auth_header: &'static str,

    /// Whether the throttle inserts a blocking wait between requests
    pub paced: bool,

    /// Concurrency envelope declared to the harness (pro tier only)
    pub envelope: Option<ConcurrencyEnvelope>,
}

/// Pro tier profile
///
/// Paid plans get dedicated capacity, so the local throttle never sleeps.
/// The envelope mirrors the documented per-key limit: 5 workers sharing
/// 10 requests per rolling second.
pub const PRO_TIER: ApiTierProfile = ApiTierProfile {
    base_url: "https://pro-api.coingecko.com/api/v3",
    auth_header: "x-cg-pro-api-key",
    paced: false,
    envelope: Some(ConcurrencyEnvelope {
        concurrency: 5,
        max_requests_per_window: 10,
        window: Duration::from_secs(1),
    }),
};

/// Public (demo) tier profile
///
/// The free tier enforces an aggressive per-minute quota, so the throttle
/// sleeps between consecutive requests instead of declaring an envelope.
pub const PUBLIC_TIER: ApiTierProfile = ApiTierProfile {
    base_url: "https://api.coingecko.com/api/v3",
    auth_header: "x-cg-demo-api-key",
    paced: true,
    envelope: None,
};

/// CoinGecko API tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTier {
    /// Paid pro API
    Pro,
    /// Free public API
    Public,
}

impl ApiTier {
    /// Resolve a configured base URL to a tier.
    ///
    /// The mapping is an immutable lookup; anything other than the two known
    /// base URLs is a configuration error surfaced at startup.
    pub fn from_base_url(url: &str) -> Result<Self, String> {
        let trimmed = url.trim_end_matches('/');
        if trimmed == PRO_TIER.base_url {
            Ok(ApiTier::Pro)
        } else if trimmed == PUBLIC_TIER.base_url {
            Ok(ApiTier::Public)
        } else {
            Err(format!(
                "Invalid api_url {url:?}: expected {} or {}",
                PRO_TIER.base_url, PUBLIC_TIER.base_url
            ))
        }
    }

    /// The static profile for this tier
    pub fn profile(&self) -> &'static ApiTierProfile {
        match self {
            ApiTier::Pro => &PRO_TIER,
            ApiTier::Public => &PUBLIC_TIER,
        }
    }
}

impl std::fmt::Display for ApiTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApiTier::Pro => "pro",
            ApiTier::Public => "public",
        };
        write!(f, "{s}")
    }
}
