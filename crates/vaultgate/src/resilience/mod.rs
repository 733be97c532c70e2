//! Failure-containment primitives composed by the gateway
//!
//! ```text
//! resilience/
//! ├── circuit_breaker.rs  # Three-state breaker with half-open probe budget
//! └── retry.rs            # Bounded exponential backoff policy
//! ```
//!
//! Both are plain state machines with no I/O of their own; the gateway owns
//! the locking, the sleeps, and the network calls.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, StateTransition,
};
pub use retry::RetryConfig;
