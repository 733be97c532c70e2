//! Resilient request gateway
//!
//! Every outbound call to the vault backend flows through here. The gateway
//! composes:
//! - the circuit breaker (fail fast during outages, bounded half-open probes)
//! - tiered timeouts selected per operation class
//! - retry with bounded exponential backoff for transport and 5xx failures
//! - the TTL response cache for GET requests, invalidated by writes before
//!   the write reports success
//!
//! A [`Gateway`] is a cheap clone over shared state: clones see one breaker,
//! one cache, and one monitor, so every caller targeting the same backend
//! shares a single failure view. Breaker state transitions are published on a
//! broadcast channel for logging/alerting consumers.
//!
//! Every code path is bounded by its tier's timeout; there is no
//! unbounded-wait path. Dropping a request future cancels the in-flight
//! call and no further retries are issued for it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::{GatewayConfig, TimeoutTier};
use crate::error::{GatewayError, GatewayResult};
use crate::monitor::PerformanceMonitor;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerStats, CircuitState, RetryConfig, StateTransition,
};

/// Maximum body length echoed back inside error messages
const ERROR_SNIPPET_LEN: usize = 200;

/// A single outbound request, constructed per call and consumed immediately
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Path relative to the configured base URL (e.g. `/vault/notes/a.md`)
    pub path: String,
    /// Query parameters, appended in order
    pub query: Vec<(String, String)>,
    /// Optional JSON body
    pub body: Option<serde_json::Value>,
    /// Timeout tier the request runs under
    pub tier: TimeoutTier,
    /// Per-request retry override; `None` uses the gateway default
    pub retry_override: Option<RetryConfig>,
    /// Skip the response cache even for GET (live probes)
    pub bypass_cache: bool,
}

impl RequestDescriptor {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            tier: TimeoutTier::Medium,
            retry_override: None,
            bypass_cache: false,
        }
    }

    /// GET request under the medium tier
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request with a JSON body
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        let mut desc = Self::new(Method::POST, path);
        desc.body = Some(body);
        desc
    }

    /// PUT request with a JSON body
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        let mut desc = Self::new(Method::PUT, path);
        desc.body = Some(body);
        desc
    }

    /// DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// GET request under the long tier, for streaming transfers
    pub fn stream(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path).with_tier(TimeoutTier::Long)
    }

    /// Select a timeout tier
    pub fn with_tier(mut self, tier: TimeoutTier) -> Self {
        self.tier = tier;
        self
    }

    /// Append a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Override the retry policy for this request only
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry_override = Some(retry);
        self
    }

    /// Skip the response cache for this request
    pub fn without_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Request identity used as the cache key
    fn cache_key(&self) -> String {
        if self.query.is_empty() {
            format!("{} {}", self.method, self.path)
        } else {
            let qs = self
                .query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            format!("{} {}?{}", self.method, self.path, qs)
        }
    }

    /// Only GETs may be re-issued unconditionally; writes are retried solely
    /// on connection-level failures where no bytes reached the backend.
    fn is_idempotent(&self) -> bool {
        self.method == Method::GET
    }

    fn is_write(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::DELETE)
    }
}

/// Raw response returned by the gateway
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Bytes,
    /// Whether this response was served from the cache
    pub from_cache: bool,
}

impl GatewayResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as UTF-8 text, lossily converted
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Breaker state transition published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitStateChange {
    /// State before the transition
    pub from: CircuitState,
    /// State after the transition
    pub to: CircuitState,
    /// Wall-clock time of the transition
    pub at: DateTime<Utc>,
}

/// Boxed byte stream returned by [`Gateway::stream_get`]
pub type ByteStream = Pin<Box<dyn Stream<Item = GatewayResult<Bytes>> + Send>>;

/// Resilient gateway over the vault REST backend
#[derive(Debug, Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: Url,
    config: Arc<GatewayConfig>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    cache: Arc<ResponseCache>,
    monitor: Arc<PerformanceMonitor>,
    events: broadcast::Sender<CircuitStateChange>,
}

impl Gateway {
    /// Build a gateway from configuration.
    ///
    /// Fails when the base URL does not parse, the bearer token is not a
    /// valid header value, or the HTTP client cannot be constructed.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let base_url = Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        if !config.api_token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", config.api_token)).map_err(
                |_| GatewayError::Configuration {
                    message: "bearer token contains characters not valid in a header".to_string(),
                },
            )?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if !config.verify_certificates {
            warn!("TLS certificate verification disabled for {}", base_url);
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let http = builder.build()?;

        let (events, _) = broadcast::channel(32);

        Ok(Self {
            http,
            base_url,
            breaker: Arc::new(Mutex::new(CircuitBreaker::new(config.circuit.clone()))),
            cache: Arc::new(ResponseCache::from_config(&config.cache)),
            monitor: Arc::new(PerformanceMonitor::new()),
            config: Arc::new(config),
            events,
        })
    }

    /// The monitor every gateway operation reports into
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Subscribe to circuit breaker state changes
    pub fn subscribe(&self) -> broadcast::Receiver<CircuitStateChange> {
        self.events.subscribe()
    }

    /// Current circuit breaker state
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.lock().state()
    }

    /// Circuit breaker statistics snapshot
    pub fn circuit_stats(&self) -> CircuitBreakerStats {
        self.breaker.lock().statistics()
    }

    /// Response cache statistics snapshot
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached response
    pub fn flush_cache(&self) {
        self.cache.flush();
    }

    /// Reset the breaker to closed and empty the cache
    pub fn reset(&self) {
        self.breaker.lock().reset();
        self.cache.flush();
    }

    /// GET through breaker, cache, and retry
    pub async fn get(&self, desc: RequestDescriptor) -> GatewayResult<GatewayResponse> {
        self.execute(desc.with_method(Method::GET)).await
    }

    /// GET with an explicit retry policy layered on
    pub async fn get_with_retry(
        &self,
        desc: RequestDescriptor,
        retry: RetryConfig,
    ) -> GatewayResult<GatewayResponse> {
        self.execute(desc.with_method(Method::GET).with_retry(retry))
            .await
    }

    /// POST through breaker and retry; invalidates the path's cache entries
    pub async fn post(&self, desc: RequestDescriptor) -> GatewayResult<GatewayResponse> {
        self.execute(desc.with_method(Method::POST)).await
    }

    /// PUT through breaker and retry; invalidates the path's cache entries
    pub async fn put(&self, desc: RequestDescriptor) -> GatewayResult<GatewayResponse> {
        self.execute(desc.with_method(Method::PUT)).await
    }

    /// DELETE through breaker and retry; invalidates the path's cache entries
    pub async fn delete(&self, desc: RequestDescriptor) -> GatewayResult<GatewayResponse> {
        self.execute(desc.with_method(Method::DELETE)).await
    }

    /// Execute a request as described, honoring its method
    pub async fn execute(&self, desc: RequestDescriptor) -> GatewayResult<GatewayResponse> {
        let op = format!("gateway.{}", desc.method.as_str().to_ascii_lowercase());
        let timer = self.monitor.start_timer(op);
        let result = self.execute_inner(&desc).await;
        timer.stop(result.is_err());
        result
    }

    /// Open a streaming GET. The response status is checked through the
    /// breaker like any other call; the returned stream yields body chunks.
    pub async fn stream_get(&self, desc: RequestDescriptor) -> GatewayResult<ByteStream> {
        let desc = desc.with_method(Method::GET);
        let timer = self.monitor.start_timer("gateway.stream_get");
        let result = self.open_stream(&desc).await;
        timer.stop(result.is_err());
        result
    }

    async fn execute_inner(&self, desc: &RequestDescriptor) -> GatewayResult<GatewayResponse> {
        let cacheable =
            self.config.cache.enabled && desc.method == Method::GET && !desc.bypass_cache;
        let cache_key = desc.cache_key();

        if cacheable {
            if let Some(hit) = self.cache.get(&cache_key) {
                debug!(key = %cache_key, "serving response from cache");
                return Ok(GatewayResponse {
                    status: hit.status,
                    body: hit.body,
                    from_cache: true,
                });
            }
        }

        let url = self.base_url.join(&desc.path)?;
        let retry = desc
            .retry_override
            .clone()
            .unwrap_or_else(|| self.config.retry.clone());
        let budget = self.config.timeouts.duration(desc.tier);
        let idempotent = desc.is_idempotent();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.acquire_permit()?;

            debug!(method = %desc.method, path = %desc.path, attempt, "dispatching request");
            let started = Instant::now();
            let mut request = self.http.request(desc.method.clone(), url.clone()).timeout(budget);
            if !desc.query.is_empty() {
                request = request.query(&desc.query);
            }
            if let Some(body) = &desc.body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    // A 4xx means the backend is alive and answering; only
                    // 5xx counts against the breaker.
                    self.record_outcome(status < 500, started.elapsed());

                    if (200..300).contains(&status) {
                        let body = response.bytes().await?;
                        if desc.is_write() {
                            // Invalidate-before-acknowledge: no concurrent
                            // read may see pre-write content once the caller
                            // observes success.
                            self.cache.invalidate_path(&desc.path);
                        } else if cacheable {
                            self.cache.set(cache_key.clone(), status, body.clone());
                        }
                        return Ok(GatewayResponse {
                            status,
                            body,
                            from_cache: false,
                        });
                    }

                    if (500..600).contains(&status) {
                        warn!(status, attempt, path = %desc.path, "server error from backend");
                        if idempotent && attempt < retry.max_attempts() {
                            tokio::time::sleep(retry.delay(attempt)).await;
                            continue;
                        }
                        return Err(GatewayError::Server { status, attempts: attempt });
                    }

                    // Everything else (4xx, unfollowed redirects) is terminal.
                    let body = response.bytes().await.unwrap_or_default();
                    return Err(GatewayError::Client {
                        status,
                        message: snippet(&body),
                    });
                }
                Err(err) => {
                    let elapsed = started.elapsed();
                    self.record_outcome(false, elapsed);

                    // Writes are re-issued only when the connection itself
                    // failed, i.e. before the backend accepted any bytes.
                    let retryable = idempotent || err.is_connect();
                    if retryable && attempt < retry.max_attempts() {
                        warn!(error = %err, attempt, path = %desc.path, "transport failure; backing off");
                        tokio::time::sleep(retry.delay(attempt)).await;
                        continue;
                    }
                    return Err(map_transport_error(err, elapsed, budget));
                }
            }
        }
    }

    async fn open_stream(&self, desc: &RequestDescriptor) -> GatewayResult<ByteStream> {
        let url = self.base_url.join(&desc.path)?;
        let budget = self.config.timeouts.duration(desc.tier);

        self.acquire_permit()?;

        let started = Instant::now();
        let mut request = self.http.get(url).timeout(budget);
        if !desc.query.is_empty() {
            request = request.query(&desc.query);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                self.record_outcome(status < 500, started.elapsed());

                if (500..600).contains(&status) {
                    return Err(GatewayError::Server { status, attempts: 1 });
                }
                if !(200..300).contains(&status) {
                    let body = response.bytes().await.unwrap_or_default();
                    return Err(GatewayError::Client {
                        status,
                        message: snippet(&body),
                    });
                }

                let stream = response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(GatewayError::from));
                Ok(Box::pin(stream) as ByteStream)
            }
            Err(err) => {
                let elapsed = started.elapsed();
                self.record_outcome(false, elapsed);
                Err(map_transport_error(err, elapsed, budget))
            }
        }
    }

    /// Ask the breaker for permission; publishes the open → half-open
    /// transition when the cool-down elapsing triggers it.
    fn acquire_permit(&self) -> GatewayResult<()> {
        let admitted = self.breaker.lock().try_acquire();
        match admitted {
            Ok(transition) => {
                if let Some(t) = transition {
                    self.publish(t);
                }
                Ok(())
            }
            Err(()) => {
                debug!("request rejected: circuit breaker open");
                Err(GatewayError::BreakerOpen)
            }
        }
    }

    fn record_outcome(&self, success: bool, duration: Duration) {
        let transition = self.breaker.lock().record(success, duration);
        if let Some(t) = transition {
            self.publish(t);
        }
    }

    fn publish(&self, transition: StateTransition) {
        match transition.to {
            CircuitState::Open => {
                warn!(from = ?transition.from, "circuit breaker opened; failing fast")
            }
            CircuitState::HalfOpen => info!("circuit breaker half-open; probing backend"),
            CircuitState::Closed => info!("circuit breaker closed; backend recovered"),
        }
        // No receivers is fine; the channel is purely observational.
        let _ = self.events.send(CircuitStateChange {
            from: transition.from,
            to: transition.to,
            at: Utc::now(),
        });
    }
}

fn map_transport_error(err: reqwest::Error, elapsed: Duration, budget: Duration) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout { elapsed, budget }
    } else {
        GatewayError::Transport { source: err }
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() <= ERROR_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(ERROR_SNIPPET_LEN).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_includes_method_and_query() {
        let desc = RequestDescriptor::get("/search/")
            .with_query("query", "alpha")
            .with_query("limit", "10");
        assert_eq!(desc.cache_key(), "GET /search/?query=alpha&limit=10");

        let desc = RequestDescriptor::get("/vault/a.md");
        assert_eq!(desc.cache_key(), "GET /vault/a.md");
    }

    #[test]
    fn test_descriptor_builders() {
        let desc = RequestDescriptor::stream("/vault/big.md");
        assert_eq!(desc.method, Method::GET);
        assert_eq!(desc.tier, TimeoutTier::Long);

        let desc = RequestDescriptor::put("/vault/a.md", serde_json::json!({"content": "x"}));
        assert!(desc.is_write());
        assert!(!desc.is_idempotent());

        let desc = RequestDescriptor::get("/").without_cache();
        assert!(desc.bypass_cache);
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let cut = snippet(long.as_bytes());
        assert!(cut.len() <= ERROR_SNIPPET_LEN + 3);
        assert!(cut.ends_with("..."));

        assert_eq!(snippet(b"  short  "), "short");
    }
}
