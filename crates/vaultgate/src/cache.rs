//! TTL response cache for read operations
//!
//! Keyed by request identity (method + path + query). Entries expire after a
//! fixed TTL and are dropped eagerly when a write to the same resource path
//! lands, so a reader can never observe pre-write content after the writer
//! saw success. Size is bounded; the oldest entries are evicted first.
//!
//! Safe under concurrent access: lookups take a read lock, mutations a write
//! lock, and no lock is held across I/O.

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch; when off, the gateway skips the cache entirely
    pub enabled: bool,
    /// Time-to-live for every entry
    pub ttl: Duration,
    /// Maximum number of entries before oldest-first eviction
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(60),
            max_entries: 1000,
        }
    }
}

/// A cached response payload
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// HTTP status of the original response
    pub status: u16,
    /// Raw response body
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    created: Instant,
}

/// Cache statistics for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live (non-expired) entries
    pub entries: usize,
    /// Entries past their TTL but not yet swept
    pub expired: usize,
    /// Configured capacity
    pub max_entries: usize,
    /// Configured TTL
    pub ttl: Duration,
}

impl CacheStats {
    /// Cache utilization as a percentage of capacity
    pub fn utilization_percent(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            (self.entries as f64 / self.max_entries as f64) * 100.0
        }
    }
}

/// In-memory TTL response cache
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    /// Create a cache with the given TTL and capacity
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Create a cache from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.max_entries)
    }

    /// Look up a fresh entry. Expired entries are treated as absent.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.created.elapsed() < self.ttl {
            Some(entry.response.clone())
        } else {
            None
        }
    }

    /// Insert or refresh an entry
    pub fn set(&self, key: impl Into<String>, status: u16, body: Bytes) {
        let mut entries = self.entries.write();
        entries.insert(
            key.into(),
            CacheEntry {
                response: CachedResponse { status, body },
                created: Instant::now(),
            },
        );
        if entries.len() > self.max_entries {
            Self::evict_oldest(&mut entries, self.max_entries);
        }
    }

    /// Remove one exact key
    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Remove every entry whose resource path starts with `path_prefix`,
    /// regardless of method or query. This is the write-invalidation hook:
    /// it runs before the write reports success to its caller.
    pub fn invalidate_path(&self, path_prefix: &str) {
        self.entries.write().retain(|key, _| {
            // Keys are "METHOD path?query"; match on the path component.
            key.split_once(' ')
                .is_none_or(|(_, rest)| !rest.starts_with(path_prefix))
        });
    }

    /// Clear all entries
    pub fn flush(&self) {
        self.entries.write().clear();
    }

    /// Drop entries past their TTL
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.entries
            .write()
            .retain(|_, entry| entry.created.elapsed() < ttl);
    }

    /// Current cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let expired = entries
            .values()
            .filter(|e| e.created.elapsed() >= self.ttl)
            .count();
        CacheStats {
            entries: entries.len() - expired,
            expired,
            max_entries: self.max_entries,
            ttl: self.ttl,
        }
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, keep: usize) {
        let excess = entries.len().saturating_sub(keep);
        if excess == 0 {
            return;
        }
        let mut by_age: Vec<(String, Instant)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.created))
            .collect();
        by_age.sort_by_key(|(_, created)| *created);
        for (key, _) in by_age.into_iter().take(excess) {
            entries.remove(&key);
        }
    }
}
