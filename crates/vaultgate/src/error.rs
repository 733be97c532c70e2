//! Error types for gateway and vault operations
//!
//! Two layers of classification:
//!
//! - [`GatewayError`] describes how a request failed mechanically: transport
//!   failure, timeout, circuit breaker rejection, or a terminal HTTP status.
//! - [`VaultError`] maps gateway outcomes to vault semantics so callers can
//!   branch on error kinds (`Unauthorized`, `NotFound`, ...) instead of raw
//!   status codes.
//!
//! A cache miss is not an error anywhere in this crate; read paths return
//! `Option` for cache lookups.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors surfaced by the resilient gateway
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// DNS/connect/TLS/read failure from the underlying HTTP client
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// Request exceeded its timeout tier budget
    #[error("request timed out after {elapsed:?} (tier budget {budget:?})")]
    Timeout { elapsed: Duration, budget: Duration },

    /// Rejected without a network attempt because the circuit is open
    #[error("circuit breaker is open; request rejected without network attempt")]
    BreakerOpen,

    /// Server-class (5xx) response that survived the retry budget
    #[error("server error {status} after {attempts} attempt(s)")]
    Server { status: u16, attempts: u32 },

    /// Client-class (4xx) response; never retried
    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    /// The base URL or a request path did not form a valid URL
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Gateway construction rejected the supplied configuration
    #[error("invalid gateway configuration: {message}")]
    Configuration { message: String },
}

impl GatewayError {
    /// Whether a retry could change the outcome.
    ///
    /// Transport failures and server-class statuses are retryable; client
    /// errors and breaker rejections are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::Server { .. } => true,
            Self::BreakerOpen
            | Self::Client { .. }
            | Self::InvalidUrl(_)
            | Self::Configuration { .. } => false,
        }
    }
}

/// Errors surfaced by the vault domain client
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VaultError {
    /// Backend rejected the bearer token (HTTP 401)
    #[error("vault authentication rejected")]
    Unauthorized,

    /// Addressed resource does not exist (HTTP 404)
    #[error("vault resource not found: {path}")]
    NotFound { path: String },

    /// Any other non-2xx backend response, retries already spent
    #[error("vault backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Backend unreachable: transport failure after retries, or breaker open
    #[error("vault backend unavailable: {source}")]
    Unavailable {
        #[source]
        source: GatewayError,
    },

    /// Backend replied 2xx but the payload did not decode
    #[error("malformed response from vault backend: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl VaultError {
    /// Classify a gateway failure against the resource path it addressed.
    pub(crate) fn classify(err: GatewayError, path: &str) -> Self {
        match err {
            GatewayError::Client { status: 401, .. } => Self::Unauthorized,
            GatewayError::Client { status: 404, .. } => Self::NotFound {
                path: path.to_string(),
            },
            GatewayError::Client { status, message } => Self::Backend { status, message },
            GatewayError::Server { status, attempts } => Self::Backend {
                status,
                message: format!("server error persisted across {attempts} attempt(s)"),
            },
            other => Self::Unavailable { source: other },
        }
    }
}
