//! Cache trait for storing provider responses.
//!
//! This module defines the [`ResponseCache`] trait. Values are stored as JSON
//! documents keyed by provider name and request key, so one cache serves the
//! subsector catalog, company lists and financial tables alike.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// Trait for caching provider responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Retrieves a cached response.
    ///
    /// Returns `Ok(Some(value))` if cached, `Ok(None)` if not cached.
    async fn get(&self, provider: &str, key: &str) -> Result<Option<Value>>;

    /// Stores a response, replacing any previous value for the same key.
    async fn put(&self, provider: &str, key: &str, value: &Value) -> Result<()>;

    /// Removes cache entries older than the specified TTL.
    ///
    /// Returns the number of entries invalidated.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;
}
