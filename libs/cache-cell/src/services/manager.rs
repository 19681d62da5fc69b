use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::CacheStats;
use crate::services::store::CacheStore;

const KEY_REGISTRY_PREFIX: &str = "CacheKeys:";

/// Keys registered under one prefix, with their expiry in unix milliseconds.
type KeyRegistry = BTreeMap<String, i64>;

/// Typed facade over a [`CacheStore`].
///
/// Entries are disposable projections: every backend failure is logged and
/// downgraded to a miss (reads) or a skipped write/eviction, never returned to
/// the caller. Keys are colon-delimited and their first segment is the
/// invalidation prefix; every live key is recorded under `CacheKeys:{prefix}`
/// so [`CacheManager::remove_by_prefix`] can find it. The registry drops keys
/// as they are removed or expire, and itself expires with its last entry.
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    stats: RwLock<CacheStats>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache read for {} failed, treating as miss: {}", key, e);
                self.record(|stats| {
                    stats.misses += 1;
                    stats.degraded_operations += 1;
                })
                .await;
                return None;
            }
        };

        let Some(raw) = raw else {
            debug!("Cache miss for {}", key);
            self.record(|stats| stats.misses += 1).await;
            return None;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                self.record(|stats| stats.hits += 1).await;
                Some(value)
            }
            Err(e) => {
                warn!("Cached value for {} is unreadable, treating as miss: {}", key, e);
                self.record(|stats| {
                    stats.misses += 1;
                    stats.degraded_operations += 1;
                })
                .await;
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize cache value for {}: {}", key, e);
                self.record(|stats| stats.degraded_operations += 1).await;
                return;
            }
        };

        if let Err(e) = self.store.set(key, json, ttl).await {
            warn!("Cache write for {} failed, skipping: {}", key, e);
            self.record(|stats| stats.degraded_operations += 1).await;
            return;
        }
        self.record(|stats| stats.writes += 1).await;

        if let Some(prefix) = registered_prefix(key) {
            self.register_key(prefix, key, ttl).await;
        }
    }

    pub async fn remove(&self, key: &str) {
        self.remove_all([key]).await;
    }

    /// Evicts `keys` and drops them from their registries, one registry
    /// update per prefix.
    pub async fn remove_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut by_prefix: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in keys {
            let key = key.as_ref();
            self.evict(key).await;
            if let Some(prefix) = registered_prefix(key) {
                by_prefix.entry(prefix.to_string()).or_default().push(key.to_string());
            }
        }

        for (prefix, keys) in by_prefix {
            self.unregister_keys(&prefix, &keys).await;
        }
    }

    /// Evicts every key registered under `prefix`. Unknown prefixes are a no-op.
    pub async fn remove_by_prefix(&self, prefix: &str) {
        let registry_key = registry_key(prefix);
        let registry = self.load_registry(&registry_key).await;

        if registry.is_empty() {
            debug!("No cache keys registered under prefix {}", prefix);
            return;
        }

        for key in registry.keys() {
            self.evict(key).await;
        }
        self.evict(&registry_key).await;
    }

    /// Unexpired keys currently registered under `prefix`.
    pub async fn registered_keys(&self, prefix: &str) -> Vec<String> {
        let now = Utc::now().timestamp_millis();
        self.load_registry(&registry_key(prefix))
            .await
            .into_iter()
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(key, _)| key)
            .collect()
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().await.clone();
        stats.refresh_hit_rate();
        stats
    }

    async fn evict(&self, key: &str) {
        match self.store.remove(key).await {
            Ok(()) => {
                debug!("Cache entry {} invalidated", key);
                self.record(|stats| stats.evictions += 1).await;
            }
            Err(e) => {
                warn!("Cache eviction for {} failed: {}", key, e);
                self.record(|stats| stats.degraded_operations += 1).await;
            }
        }
    }

    // Registry updates are last-writer-wins; a lost registration only delays
    // that key's eviction until its TTL.
    async fn register_key(&self, prefix: &str, key: &str, ttl: Duration) {
        let registry_key = registry_key(prefix);
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        let mut registry = self.load_registry(&registry_key).await;
        registry.retain(|_, expires_at| *expires_at > now);
        registry.insert(key.to_string(), now.saturating_add(ttl_ms));

        self.save_registry(&registry_key, &registry, now).await;
    }

    async fn unregister_keys(&self, prefix: &str, keys: &[String]) {
        let registry_key = registry_key(prefix);
        let mut registry = self.load_registry(&registry_key).await;
        if registry.is_empty() {
            return;
        }

        let before = registry.len();
        let now = Utc::now().timestamp_millis();
        registry.retain(|key, expires_at| *expires_at > now && !keys.contains(key));
        if registry.len() == before {
            return;
        }

        self.save_registry(&registry_key, &registry, now).await;
    }

    async fn save_registry(&self, registry_key: &str, registry: &KeyRegistry, now: i64) {
        // The registry lives exactly as long as its longest-lived key.
        let Some(latest) = registry.values().max() else {
            self.evict(registry_key).await;
            return;
        };
        let ttl = Duration::from_millis(u64::try_from(latest - now).unwrap_or(0).max(1));

        let json = match serde_json::to_string(registry) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize key registry {}: {}", registry_key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(registry_key, json, ttl).await {
            warn!("Key registry update for {} failed: {}", registry_key, e);
            self.record(|stats| stats.degraded_operations += 1).await;
        }
    }

    async fn load_registry(&self, registry_key: &str) -> KeyRegistry {
        match self.store.get(registry_key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Key registry {} is unreadable: {}", registry_key, e);
                KeyRegistry::new()
            }),
            Ok(None) => KeyRegistry::new(),
            Err(e) => {
                warn!("Key registry {} unavailable: {}", registry_key, e);
                KeyRegistry::new()
            }
        }
    }

    async fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.write().await;
        update(&mut stats);
    }
}

fn prefix_of(key: &str) -> Option<&str> {
    match key.split_once(':') {
        Some((prefix, _)) if !prefix.is_empty() => Some(prefix),
        _ => None,
    }
}

/// Prefix under which `key` is registered. Registry entries are not.
fn registered_prefix(key: &str) -> Option<&str> {
    prefix_of(key).filter(|_| !key.starts_with(KEY_REGISTRY_PREFIX))
}

fn registry_key(prefix: &str) -> String {
    format!("{}{}", KEY_REGISTRY_PREFIX, prefix)
}
