//! Vault domain client
//!
//! Translates vault operations (list, read, write, delete, search, commands)
//! into gateway calls and maps backend responses onto [`VaultError`] kinds so
//! callers branch on semantics, never on raw status codes.
//!
//! Every operation is timed into the shared performance monitor under a
//! stable `vault.*` name. The [`VaultClient::health_check`] probe returns a
//! structured [`HealthStatus`] instead of an error, so liveness loops can
//! poll indefinitely without special-casing failure kinds.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{GatewayConfig, TimeoutTier};
use crate::error::{GatewayError, GatewayResult, VaultError, VaultResult};
use crate::gateway::{Gateway, RequestDescriptor};
use crate::monitor::PerformanceMonitor;
use crate::resilience::RetryConfig;

const VAULT_ROOT: &str = "/vault/";
const SEARCH_PATH: &str = "/search/";
const COMMANDS_PATH: &str = "/commands/";

/// One match returned by [`VaultClient::search`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Vault-relative path of the matching file
    pub path: String,
    /// Relevance score assigned by the backend
    pub score: f64,
    /// Optional context excerpt around the match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// A command the backend can execute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Stable command identifier
    pub id: String,
    /// Human-readable command name
    pub name: String,
}

/// Outcome of a liveness probe.
///
/// Always returned by value, never as an error, so polling loops need no
/// error handling to keep running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the probe got a 200 back
    pub healthy: bool,
    /// Time the probe took, including a failed attempt
    pub response_time: Duration,
    /// Status code when a response arrived at all
    pub status: Option<u16>,
    /// Failure description when unhealthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileListing {
    files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NoteContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearchListing {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct CommandListing {
    commands: Vec<CommandInfo>,
}

/// Typed client for vault operations.
///
/// Cheap to clone; clones share the underlying gateway, so they also share
/// its circuit breaker, cache, and monitor. Multiple clients targeting the
/// same backend should be built from one gateway to keep a single breaker
/// view of the outage state.
#[derive(Debug, Clone)]
pub struct VaultClient {
    gateway: Gateway,
}

impl VaultClient {
    /// Build a client over an existing gateway
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Build a gateway from configuration and wrap it
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        Ok(Self::new(Gateway::new(config)?))
    }

    /// The gateway this client issues requests through
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The monitor all operations report into
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        self.gateway.monitor()
    }

    /// List every file in the vault. An empty vault is an empty listing.
    pub async fn list_files(&self) -> VaultResult<Vec<String>> {
        let timer = self.monitor().start_timer("vault.list_files");
        let result = self.list_files_inner().await;
        timer.stop(result.is_err());
        result
    }

    async fn list_files_inner(&self) -> VaultResult<Vec<String>> {
        let response = self
            .gateway
            .get(RequestDescriptor::get(VAULT_ROOT))
            .await
            .map_err(|e| VaultError::classify(e, VAULT_ROOT))?;
        let listing: FileListing = response.json()?;
        Ok(listing.files)
    }

    /// Read one file's content
    pub async fn get_file_content(&self, path: &str) -> VaultResult<String> {
        let timer = self.monitor().start_timer("vault.get_file_content");
        let result = self.get_file_content_inner(path).await;
        timer.stop(result.is_err());
        result
    }

    async fn get_file_content_inner(&self, path: &str) -> VaultResult<String> {
        let resource = file_path(path);
        let response = self
            .gateway
            .get(RequestDescriptor::get(&resource))
            .await
            .map_err(|e| VaultError::classify(e, path))?;
        let note: NoteContent = response.json()?;
        Ok(note.content)
    }

    /// Create a file. The path's cache entries are invalidated before this
    /// returns, so a subsequent read observes the new content.
    pub async fn create_file(&self, path: &str, content: &str) -> VaultResult<()> {
        let timer = self.monitor().start_timer("vault.create_file");
        let result = self.write_file(path, content, false).await;
        timer.stop(result.is_err());
        result
    }

    /// Overwrite a file's content, with the same invalidation guarantee as
    /// [`Self::create_file`]
    pub async fn update_file(&self, path: &str, content: &str) -> VaultResult<()> {
        let timer = self.monitor().start_timer("vault.update_file");
        let result = self.write_file(path, content, true).await;
        timer.stop(result.is_err());
        result
    }

    async fn write_file(&self, path: &str, content: &str, overwrite: bool) -> VaultResult<()> {
        let resource = file_path(path);
        let body = serde_json::json!({ "content": content });
        let desc = if overwrite {
            RequestDescriptor::put(&resource, body)
        } else {
            RequestDescriptor::post(&resource, body)
        };
        self.gateway
            .execute(desc)
            .await
            .map_err(|e| VaultError::classify(e, path))?;
        debug!(path, overwrite, "vault file written");
        Ok(())
    }

    /// Delete a file. Deleting a missing path surfaces [`VaultError::NotFound`].
    pub async fn delete_file(&self, path: &str) -> VaultResult<()> {
        let timer = self.monitor().start_timer("vault.delete_file");
        let result = self.delete_file_inner(path).await;
        timer.stop(result.is_err());
        result
    }

    async fn delete_file_inner(&self, path: &str) -> VaultResult<()> {
        let resource = file_path(path);
        self.gateway
            .delete(RequestDescriptor::delete(&resource))
            .await
            .map_err(|e| VaultError::classify(e, path))?;
        debug!(path, "vault file deleted");
        Ok(())
    }

    /// Free-text search. A term with no matches is an empty result set,
    /// not an error. Results are cached keyed by (query, limit).
    pub async fn search(&self, query: &str, limit: usize) -> VaultResult<Vec<SearchResult>> {
        let timer = self.monitor().start_timer("vault.search");
        let result = self.search_inner(query, limit).await;
        timer.stop(result.is_err());
        result
    }

    async fn search_inner(&self, query: &str, limit: usize) -> VaultResult<Vec<SearchResult>> {
        let desc = RequestDescriptor::get(SEARCH_PATH)
            .with_query("query", query)
            .with_query("limit", limit.to_string());
        let response = self
            .gateway
            .get(desc)
            .await
            .map_err(|e| VaultError::classify(e, SEARCH_PATH))?;
        let listing: SearchListing = response.json()?;
        Ok(listing.results)
    }

    /// List commands the backend can execute
    pub async fn list_commands(&self) -> VaultResult<Vec<CommandInfo>> {
        let timer = self.monitor().start_timer("vault.list_commands");
        let result = self.list_commands_inner().await;
        timer.stop(result.is_err());
        result
    }

    async fn list_commands_inner(&self) -> VaultResult<Vec<CommandInfo>> {
        let response = self
            .gateway
            .get(RequestDescriptor::get(COMMANDS_PATH))
            .await
            .map_err(|e| VaultError::classify(e, COMMANDS_PATH))?;
        let listing: CommandListing = response.json()?;
        Ok(listing.commands)
    }

    /// Execute a command by id with JSON parameters
    pub async fn execute_command(
        &self,
        id: &str,
        params: serde_json::Value,
    ) -> VaultResult<serde_json::Value> {
        let timer = self.monitor().start_timer("vault.execute_command");
        let result = self.execute_command_inner(id, params).await;
        timer.stop(result.is_err());
        result
    }

    async fn execute_command_inner(
        &self,
        id: &str,
        params: serde_json::Value,
    ) -> VaultResult<serde_json::Value> {
        let resource = format!("{COMMANDS_PATH}{id}");
        let response = self
            .gateway
            .post(RequestDescriptor::post(&resource, params))
            .await
            .map_err(|e| VaultError::classify(e, &resource))?;
        if response.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(response.json()?)
    }

    /// Liveness probe: a capability read under the short timeout tier, no
    /// retries, no cache. Success means a 200; anything else, including
    /// transport failures and breaker rejections, is reported as unhealthy
    /// inside the returned status.
    pub async fn health_check(&self) -> HealthStatus {
        let timer = self.monitor().start_timer("vault.health_check");
        let started = Instant::now();
        let result = self
            .gateway
            .get(
                RequestDescriptor::get("/")
                    .with_tier(TimeoutTier::Short)
                    .with_retry(RetryConfig::none())
                    .without_cache(),
            )
            .await;
        let response_time = started.elapsed();

        let status = match result {
            Ok(response) => {
                let healthy = response.status == 200;
                timer.stop(!healthy);
                HealthStatus {
                    healthy,
                    response_time,
                    status: Some(response.status),
                    error: if healthy {
                        None
                    } else {
                        Some(format!("unexpected status {}", response.status))
                    },
                }
            }
            Err(err) => {
                timer.stop(true);
                HealthStatus {
                    healthy: false,
                    response_time,
                    status: status_of(&err),
                    error: Some(err.to_string()),
                }
            }
        };
        debug!(healthy = status.healthy, elapsed = ?status.response_time, "health probe finished");
        status
    }
}

fn file_path(path: &str) -> String {
    format!("{VAULT_ROOT}{}", path.trim_start_matches('/'))
}

fn status_of(err: &GatewayError) -> Option<u16> {
    match err {
        GatewayError::Server { status, .. } | GatewayError::Client { status, .. } => Some(*status),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_normalization() {
        assert_eq!(file_path("notes/a.md"), "/vault/notes/a.md");
        assert_eq!(file_path("/notes/a.md"), "/vault/notes/a.md");
    }

    #[test]
    fn test_status_extraction() {
        assert_eq!(
            status_of(&GatewayError::Client {
                status: 404,
                message: String::new()
            }),
            Some(404)
        );
        assert_eq!(
            status_of(&GatewayError::Server {
                status: 502,
                attempts: 2
            }),
            Some(502)
        );
        assert_eq!(status_of(&GatewayError::BreakerOpen), None);
    }

    #[test]
    fn test_search_result_decoding() {
        let json = serde_json::json!({
            "results": [
                { "path": "notes/a.md", "score": 0.92, "excerpt": "…alpha…" },
                { "path": "notes/b.md", "score": 0.41 }
            ]
        });
        let listing: SearchListing = serde_json::from_value(json).unwrap();
        assert_eq!(listing.results.len(), 2);
        assert_eq!(listing.results[0].path, "notes/a.md");
        assert!(listing.results[1].excerpt.is_none());
    }
}
