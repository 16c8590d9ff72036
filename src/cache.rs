//! Short-TTL cache of raw origin manifests, keyed by storage key.
//!
//! Many viewers opening the same asset at once would otherwise each hit the
//! origin store. Raw text is cached rather than the rewritten output because
//! rewriting is cheap and the CDN host may differ between deployments.

use crate::metrics;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone, Debug)]
struct CachedManifest {
    body: Arc<str>,
    fetched_at: Instant,
}

/// Thread-safe manifest cache. A zero TTL disables caching entirely.
#[derive(Clone, Debug)]
pub struct ManifestCache {
    entries: Arc<DashMap<String, CachedManifest>>,
    ttl: Duration,
}

impl ManifestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Fresh manifest body for `storage_key`, if any.
    pub fn get(&self, storage_key: &str) -> Option<Arc<str>> {
        if !self.is_enabled() {
            return None;
        }

        if let Some(entry) = self.entries.get(storage_key) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!("Manifest cache HIT for {}", storage_key);
                metrics::record_cache("hit");
                return Some(Arc::clone(&entry.body));
            }
            // Release the read guard before removing
            drop(entry);
            self.entries.remove(storage_key);
        }

        debug!("Manifest cache MISS for {}", storage_key);
        metrics::record_cache("miss");
        None
    }

    pub fn insert(&self, storage_key: &str, body: &str) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(
            storage_key.to_string(),
            CachedManifest {
                body: Arc::from(body),
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
