// Session Credential Store
//
// Maps an opaque session handle to the credential configuration stored by
// `configure_credentials`. The resolver only sees the `SessionStore` trait so
// a persistent backend can replace the bounded in-memory map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::CredentialConfig;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored configuration for a handle, if any and not expired
    async fn load(&self, handle: &str) -> Option<CredentialConfig>;

    /// Store a configuration, replacing any previous one (last writer wins)
    async fn store(&self, handle: &str, config: CredentialConfig);

    /// Drop the configuration for a handle. Returns whether one existed.
    async fn remove(&self, handle: &str) -> bool;

    /// Number of live entries
    async fn len(&self) -> usize;
}

struct StoredEntry {
    config: CredentialConfig,
    stored_at: Instant,
}

/// In-memory store with a capacity bound and optional expiry.
///
/// At capacity, the oldest entry is evicted to make room.
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn is_expired(&self, entry: &StoredEntry, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.duration_since(entry.stored_at) >= ttl)
            .unwrap_or(false)
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(1024, None)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, handle: &str) -> Option<CredentialConfig> {
        let entries = self.entries.read().await;
        let entry = entries.get(handle)?;
        if self.is_expired(entry, Instant::now()) {
            debug!(session = handle, "Stored credentials expired");
            return None;
        }
        Some(entry.config.clone())
    }

    async fn store(&self, handle: &str, config: CredentialConfig) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        entries.retain(|_, entry| !self.is_expired(entry, now));

        if !entries.contains_key(handle) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                debug!(session = %key, "Evicting oldest stored credentials");
                entries.remove(&key);
            }
        }

        entries.insert(handle.to_string(), StoredEntry { config, stored_at: now });
    }

    async fn remove(&self, handle: &str) -> bool {
        self.entries.write().await.remove(handle).is_some()
    }

    async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count()
    }
}
