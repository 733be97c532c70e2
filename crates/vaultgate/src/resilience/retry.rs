//! Retry policy with bounded exponential backoff
//!
//! Governs how many times the gateway re-issues a failed request and how long
//! it waits between attempts. Only transport failures and server-class (5xx)
//! statuses are retry-eligible; client-class (4xx) responses never are.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for the computed delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with sensible defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts the gateway will make under this policy
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Doubles per attempt from `base_delay`, capped at `max_delay`, with
    /// ±25% jitter to keep concurrent callers from retrying in lockstep.
    /// The jitter is derived from the attempt number so delays stay
    /// reproducible in tests without pulling in a rand dependency.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.as_millis() as u64;
        let uncapped = base.saturating_mul(1u64 << exp);
        let capped = uncapped.min(self.max_delay.as_millis() as u64);

        let jitter_range = capped / 4;
        let jittered = if jitter_range > 0 {
            let hash = u64::from(attempt)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let offset = hash % (jitter_range * 2);
            capped.saturating_sub(jitter_range).saturating_add(offset)
        } else {
            capped
        };

        Duration::from_millis(jittered)
    }

    /// Whether an HTTP status is retry-eligible
    pub fn retryable_status(status: u16) -> bool {
        (500..600).contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_accounting() {
        let config = RetryConfig {
            max_retries: 3,
            ..RetryConfig::default()
        };
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(RetryConfig::none().max_attempts(), 1);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(800),
        };

        // Jitter is ±25%, so compare against the jitter-free envelope.
        let envelope =
            |attempt: u32| -> u64 { (100u64 << (attempt - 1).min(16)).min(800) };

        for attempt in 1..=6 {
            let delay = config.delay(attempt).as_millis() as u64;
            let center = envelope(attempt);
            assert!(delay >= center - center / 4, "attempt {attempt}: {delay}ms");
            assert!(delay <= center + center / 4, "attempt {attempt}: {delay}ms");
        }

        // Deep attempts stay within the cap's jitter envelope.
        assert!(config.delay(10) <= Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_is_deterministic() {
        let config = RetryConfig::default();
        assert_eq!(config.delay(2), config.delay(2));
    }

    #[test]
    fn test_status_eligibility() {
        assert!(RetryConfig::retryable_status(500));
        assert!(RetryConfig::retryable_status(503));
        assert!(!RetryConfig::retryable_status(404));
        assert!(!RetryConfig::retryable_status(401));
        assert!(!RetryConfig::retryable_status(200));
    }
}
