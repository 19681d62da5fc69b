use std::time::Duration;

use async_trait::async_trait;

use crate::CacheError;

/// Raw string key/value backend with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Removing a key that does not exist is not an error.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}
