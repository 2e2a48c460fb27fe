//! In-process HTTP response cache
//!
//! Cache-aside front for the retrieval path: complete responses keyed by
//! the inbound request URI, authoritative until the configured max-age
//! elapses. Lookups do lazy expiry; a periodic sweeper reclaims whatever
//! lookups never touch again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

/// A complete cached HTTP response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Shared response cache
///
/// One instance per process, handed to handlers through the application
/// state. Entries are never refreshed in place; once expired they are
/// simply misses until the sweeper drops them.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_age: Duration,
}

/// Cache observability snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub body_bytes: u64,
}

impl ResponseCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    /// Freshness window entries are stored with
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Look up a fresh cached response for the given request identity.
    pub async fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.response.clone()),
            _ => None,
        }
    }

    /// Store a response under the given request identity.
    pub async fn insert(&self, key: String, response: CachedResponse) {
        let entry = CacheEntry {
            response,
            expires_at: Instant::now() + self.max_age,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let body_bytes = entries
            .values()
            .map(|entry| entry.response.body.len() as u64)
            .sum();
        CacheStats {
            entries: entries.len(),
            body_bytes,
        }
    }

    /// Periodic maintenance loop, spawned once at startup.
    pub async fn sweep_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = self.purge_expired().await;
            if purged > 0 {
                debug!("response cache sweep removed {} expired entries", purged);
            }
        }
    }
}
