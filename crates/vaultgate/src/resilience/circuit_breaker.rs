//! Circuit breaker for backend fault tolerance
//!
//! A three-state gate in front of every outbound request:
//! - Tracks consecutive failures and trips open when a threshold is reached
//! - Fails fast while open, with zero network I/O
//! - After a cool-down, admits a bounded budget of half-open probes
//! - Closes again once enough probes succeed; reopens on any probe failure
//! - Maintains a rolling window of outcomes for failure-rate statistics

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to trip the circuit open
    pub failure_threshold: u32,
    /// Time spent open before probing is allowed
    pub cooldown: Duration,
    /// Probe requests admitted per half-open round
    pub half_open_max_probes: u32,
    /// Successful probes required to close the circuit
    pub success_threshold: u32,
    /// Rolling window size for failure-rate statistics
    pub rolling_window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            half_open_max_probes: 3,
            success_threshold: 2,
            rolling_window_size: 100,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker configuration with sensible defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration tuned for a flaky local backend: trips sooner and
    /// probes more eagerly than the defaults.
    pub fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(10),
            half_open_max_probes: 1,
            success_threshold: 1,
            rolling_window_size: 50,
        }
    }
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    #[default]
    Closed,
    /// Backend assumed down, requests fail fast
    Open,
    /// Testing whether the backend recovered
    HalfOpen,
}

/// A state transition, reported to the caller so it can notify observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    /// State before the transition
    pub from: CircuitState,
    /// State after the transition
    pub to: CircuitState,
}

/// Recorded outcome of one guarded operation
#[derive(Debug, Clone)]
struct OperationOutcome {
    at: Instant,
    success: bool,
    duration: Duration,
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    /// Current circuit state
    pub state: CircuitState,
    /// Consecutive failures observed while closed
    pub consecutive_failures: u32,
    /// Successful probes in the current half-open round
    pub half_open_successes: u32,
    /// Failure rate over the rolling window (0.0 - 1.0)
    pub failure_rate: f64,
    /// Average guarded operation duration over the window
    pub avg_operation_duration: Duration,
    /// Time spent in the current state
    pub time_in_current_state: Duration,
}

/// Circuit breaker implementation.
///
/// Not internally synchronized; the gateway holds it behind a single lock so
/// every caller targeting the same backend shares one failure view.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    /// Probes admitted in the current half-open round
    probes_issued: u32,
    half_open_successes: u32,
    last_state_change: Instant,
    rolling_window: VecDeque<OperationOutcome>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            probes_issued: 0,
            half_open_successes: 0,
            last_state_change: Instant::now(),
            rolling_window: VecDeque::new(),
        }
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Ask permission to issue one request.
    ///
    /// Returns `Err(())` when the request must be rejected without touching
    /// the network. `Ok(Some(..))` carries the open → half-open transition
    /// when the cool-down elapsing triggers it.
    pub fn try_acquire(&mut self) -> Result<Option<StateTransition>, ()> {
        let transition = self.advance_clock();

        match self.state {
            CircuitState::Closed => Ok(transition),
            CircuitState::Open => Err(()),
            CircuitState::HalfOpen => {
                if self.probes_issued < self.config.half_open_max_probes {
                    self.probes_issued += 1;
                    Ok(transition)
                } else {
                    Err(())
                }
            }
        }
    }

    /// Record the outcome of a request admitted by [`Self::try_acquire`].
    ///
    /// Returns the state transition this outcome caused, if any.
    pub fn record(&mut self, success: bool, duration: Duration) -> Option<StateTransition> {
        self.rolling_window.push_back(OperationOutcome {
            at: Instant::now(),
            success,
            duration,
        });
        while self.rolling_window.len() > self.config.rolling_window_size {
            self.rolling_window.pop_front();
        }

        match self.state {
            CircuitState::Closed => {
                if success {
                    self.consecutive_failures = 0;
                    None
                } else {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= self.config.failure_threshold {
                        Some(self.transition_to(CircuitState::Open))
                    } else {
                        None
                    }
                }
            }
            CircuitState::HalfOpen => {
                if success {
                    self.half_open_successes += 1;
                    if self.half_open_successes >= self.config.success_threshold {
                        Some(self.transition_to(CircuitState::Closed))
                    } else {
                        None
                    }
                } else {
                    Some(self.transition_to(CircuitState::Open))
                }
            }
            // A straggler finishing after the circuit tripped; outcome already
            // counted in the window above.
            CircuitState::Open => None,
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Get circuit breaker statistics
    pub fn statistics(&self) -> CircuitBreakerStats {
        let failure_rate = if self.rolling_window.is_empty() {
            0.0
        } else {
            let failures = self.rolling_window.iter().filter(|o| !o.success).count();
            failures as f64 / self.rolling_window.len() as f64
        };

        let avg_duration = if self.rolling_window.is_empty() {
            Duration::ZERO
        } else {
            let total: Duration = self.rolling_window.iter().map(|o| o.duration).sum();
            total / self.rolling_window.len() as u32
        };

        CircuitBreakerStats {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            half_open_successes: self.half_open_successes,
            failure_rate,
            avg_operation_duration: avg_duration,
            time_in_current_state: self.last_state_change.elapsed(),
        }
    }

    /// Age of the newest entry in the rolling window, if any
    pub fn last_outcome_age(&self) -> Option<Duration> {
        self.rolling_window.back().map(|o| o.at.elapsed())
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.probes_issued = 0;
        self.half_open_successes = 0;
        self.last_state_change = Instant::now();
        self.rolling_window.clear();
    }

    /// Apply time-based transitions: open → half-open after the cool-down,
    /// and a fresh probe round when a half-open budget sat exhausted for a
    /// further cool-down (keeps a too-small budget from wedging the breaker).
    fn advance_clock(&mut self) -> Option<StateTransition> {
        match self.state {
            CircuitState::Open if self.last_state_change.elapsed() >= self.config.cooldown => {
                Some(self.transition_to(CircuitState::HalfOpen))
            }
            CircuitState::HalfOpen
                if self.probes_issued >= self.config.half_open_max_probes
                    && self.last_state_change.elapsed() >= self.config.cooldown =>
            {
                self.probes_issued = 0;
                self.half_open_successes = 0;
                self.last_state_change = Instant::now();
                None
            }
            _ => None,
        }
    }

    fn transition_to(&mut self, to: CircuitState) -> StateTransition {
        let from = self.state;
        self.state = to;
        self.last_state_change = Instant::now();
        self.consecutive_failures = 0;
        self.probes_issued = 0;
        self.half_open_successes = 0;
        StateTransition { from, to }
    }
}
