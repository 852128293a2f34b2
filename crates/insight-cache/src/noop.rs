//! No-op cache implementation.

use async_trait::async_trait;
use insight_core::{ResponseCache, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `get` always returns `Ok(None)` and `put` always returns `Ok(())`, so every
/// selection re-queries the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResponseCache for NoopCache {
    async fn get(&self, _provider: &str, _key: &str) -> Result<Option<Value>> {
        trace!("NoopCache: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _provider: &str, _key: &str, _value: &Value) -> Result<()> {
        trace!("NoopCache: put called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self, _ttl: Duration) -> Result<usize> {
        trace!("NoopCache: invalidate_stale called, returning 0");
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopCache: clear called, doing nothing");
        Ok(())
    }
}
