//! # vaultgate
//!
//! Resilient client layer for a local note-vault REST API. Every outbound
//! call is mediated by a gateway that tolerates an unreliable single-instance
//! backend without overwhelming it, avoids redundant traffic, and reports on
//! its own health.
//!
//! ## Reliability Features
//!
//! - **Circuit breaker**: trips open after consecutive failures, fails fast
//!   during outages, recovers through a bounded half-open probe budget
//! - **Tiered timeouts**: short/medium/long budgets selected per operation
//!   class instead of ad hoc per call
//! - **Retry with backoff**: bounded exponential backoff with jitter, applied
//!   only where a retry can help (transport failures and 5xx)
//! - **TTL response cache**: read-through caching with write-triggered
//!   invalidation, so a read after a write never sees pre-write content
//! - **Performance monitoring**: per-operation latency/error aggregates,
//!   health classification, and actionable recommendations
//!
//! ## Module Organization
//!
//! ```text
//! vaultgate/
//! ├── config.rs           # Configuration surface (consumed, not loaded)
//! ├── error.rs            # Gateway and vault error taxonomies
//! ├── cache.rs            # TTL response cache
//! ├── resilience/         # Circuit breaker and retry policy
//! ├── gateway.rs          # Resilient request gateway
//! ├── vault.rs            # Vault domain client
//! └── monitor.rs          # Performance monitor
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vaultgate::{GatewayConfig, VaultClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new("https://127.0.0.1:27124", "secret-token");
//! let client = VaultClient::from_config(config)?;
//!
//! let files = client.list_files().await?;
//! println!("{} files in the vault", files.len());
//!
//! let health = client.health_check().await;
//! println!("healthy: {} ({:?})", health.healthy, health.response_time);
//!
//! let report = client.monitor().generate_report();
//! println!("overall health: {}", report.health);
//! # Ok(())
//! # }
//! ```
//!
//! ## Sharing
//!
//! [`Gateway`] and [`VaultClient`] are cheap clones over shared state: all
//! clones see one circuit breaker, one cache, and one monitor. Build one
//! gateway per backend target and clone it, rather than constructing
//! independent gateways whose separate breakers would mask a real outage.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod monitor;
pub mod resilience;
pub mod vault;

pub use cache::{CacheConfig, CacheStats, CachedResponse, ResponseCache};
pub use config::{GatewayConfig, TimeoutTier, TimeoutTiers};
pub use error::{GatewayError, GatewayResult, VaultError, VaultResult};
pub use gateway::{
    ByteStream, CircuitStateChange, Gateway, GatewayResponse, RequestDescriptor,
};
pub use monitor::{
    HealthRating, MetricsExport, OperationMetric, OperationTimer, PerformanceMonitor,
    PerformanceReport, SummaryStats,
};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, RetryConfig,
    StateTransition,
};
pub use vault::{CommandInfo, HealthStatus, SearchResult, VaultClient};
