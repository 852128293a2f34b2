//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::Utc;
use insight_core::{ResponseCache, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    cached_at: chrono::DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: Value) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Key for cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    provider: String,
    key: String,
}

impl EntryKey {
    fn new(provider: &str, key: &str) -> Self {
        Self {
            provider: provider.to_string(),
            key: key.to_string(),
        }
    }
}

/// In-memory response cache.
///
/// Entries live in a `RwLock`-protected `HashMap` and are lost when the cache
/// is dropped. Values are cloned on get and put.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<EntryKey, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    #[instrument(skip(self), fields(provider = %provider, key = %key))]
    async fn get(&self, provider: &str, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().await;
        match entries.get(&EntryKey::new(provider, key)) {
            Some(entry) => {
                debug!("Cache hit");
                Ok(Some(entry.value.clone()))
            }
            None => {
                debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), fields(provider = %provider, key = %key))]
    async fn put(&self, provider: &str, key: &str, value: &Value) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(EntryKey::new(provider, key), CacheEntry::new(value.clone()));
        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(ttl));
        let removed = before - entries.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = InMemoryCache::new();

        // Initially no data
        assert!(cache.get("Sectors", "subsectors").await.unwrap().is_none());

        let value = json!([{"subsector": "banks"}, {"subsector": "retail"}]);
        cache.put("Sectors", "subsectors", &value).await.unwrap();

        let cached = cache.get("Sectors", "subsectors").await.unwrap();
        assert_eq!(cached, Some(value));
    }

    #[tokio::test]
    async fn test_memory_cache_keys_are_per_provider() {
        let cache = InMemoryCache::new();
        cache
            .put("Sectors", "companies:banks", &json!([]))
            .await
            .unwrap();

        assert!(cache.get("Other", "companies:banks").await.unwrap().is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_cache_invalidate_stale() {
        let cache = InMemoryCache::new();
        cache.put("Sectors", "a", &json!(1)).await.unwrap();
        cache.put("Sectors", "b", &json!(2)).await.unwrap();

        // Nothing is older than an hour
        let removed = cache
            .invalidate_stale(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = cache.invalidate_stale(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_cache_clear() {
        let cache = InMemoryCache::new();
        cache.put("Sectors", "subsectors", &json!([])).await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.get("Sectors", "subsectors").await.unwrap().is_none());
    }
}
