//! Gateway configuration surface
//!
//! These types are consumed by the gateway, not loaded by it; sourcing values
//! from files or the environment is the embedding application's concern.
//! Component-level knobs (retry, circuit breaker, cache) live with their
//! components and are aggregated here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};

/// Named timeout tier selected per operation class.
///
/// Health probes run under [`TimeoutTier::Short`], ordinary CRUD under
/// [`TimeoutTier::Medium`], and bulk or streaming transfers under
/// [`TimeoutTier::Long`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutTier {
    /// Liveness probes and other latency-sensitive reads
    Short,
    /// Default for CRUD operations
    Medium,
    /// Bulk and streaming transfers
    Long,
}

/// Duration mapping for the three timeout tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutTiers {
    /// Budget for [`TimeoutTier::Short`]
    pub short: Duration,
    /// Budget for [`TimeoutTier::Medium`]
    pub medium: Duration,
    /// Budget for [`TimeoutTier::Long`]
    pub long: Duration,
}

impl Default for TimeoutTiers {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(3),
            medium: Duration::from_secs(10),
            long: Duration::from_secs(60),
        }
    }
}

impl TimeoutTiers {
    /// Resolve a tier to its configured duration
    pub fn duration(&self, tier: TimeoutTier) -> Duration {
        match tier {
            TimeoutTier::Short => self.short,
            TimeoutTier::Medium => self.medium,
            TimeoutTier::Long => self.long,
        }
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the vault REST service (e.g. `https://127.0.0.1:27124`)
    pub base_url: String,

    /// Bearer token attached to every request
    pub api_token: String,

    /// Per-tier timeout budgets
    pub timeouts: TimeoutTiers,

    /// Default retry policy; individual requests may override
    pub retry: RetryConfig,

    /// Circuit breaker thresholds
    pub circuit: CircuitBreakerConfig,

    /// Response cache sizing and TTL
    pub cache: CacheConfig,

    /// Verify TLS certificates. Local vault services commonly present
    /// self-signed certificates, so this can be disabled per deployment;
    /// it is never disabled by default.
    pub verify_certificates: bool,

    /// User-Agent header (set to `None` to omit the header)
    pub user_agent: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1:27124".to_string(),
            api_token: String::new(),
            timeouts: TimeoutTiers::default(),
            retry: RetryConfig::default(),
            circuit: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            verify_certificates: true,
            user_agent: Some(format!("vaultgate/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl GatewayConfig {
    /// Configuration pointing at the given base URL with the given token
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_resolution() {
        let tiers = TimeoutTiers::default();
        assert_eq!(tiers.duration(TimeoutTier::Short), tiers.short);
        assert_eq!(tiers.duration(TimeoutTier::Medium), tiers.medium);
        assert_eq!(tiers.duration(TimeoutTier::Long), tiers.long);
        assert!(tiers.short < tiers.medium && tiers.medium < tiers.long);
    }

    #[test]
    fn test_default_config_is_strict_about_tls() {
        let config = GatewayConfig::default();
        assert!(config.verify_certificates);
    }
}
