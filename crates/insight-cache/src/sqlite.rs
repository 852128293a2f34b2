//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use insight_core::{InsightError, ResponseCache, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, instrument};

/// SQLite-based response cache.
///
/// Stores responses in a SQLite database file so they survive restarts.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| InsightError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| InsightError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| InsightError::Cache("SQLite connection lock poisoned".to_string()))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS response_cache (
                provider TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                data_json TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (provider, cache_key)
            )",
            [],
        )
        .map_err(|e| InsightError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_response_cache_cached_at
             ON response_cache(cached_at)",
            [],
        )
        .map_err(|e| InsightError::Cache(e.to_string()))?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }
}

#[async_trait]
impl ResponseCache for SqliteCache {
    #[instrument(skip(self), fields(provider = %provider, key = %key))]
    async fn get(&self, provider: &str, key: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;

        let data_json: Option<String> = conn
            .query_row(
                "SELECT data_json FROM response_cache
                 WHERE provider = ?1 AND cache_key = ?2",
                params![provider, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| InsightError::Cache(e.to_string()))?;

        match data_json {
            Some(json) => {
                debug!("Cache hit");
                let value = serde_json::from_str(&json)
                    .map_err(|e| InsightError::Cache(format!("corrupt cache entry: {e}")))?;
                Ok(Some(value))
            }
            None => {
                debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), fields(provider = %provider, key = %key))]
    async fn put(&self, provider: &str, key: &str, value: &Value) -> Result<()> {
        let data_json = value.to_string();
        let cached_at = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);

        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO response_cache
             (provider, cache_key, data_json, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![provider, key, data_json, cached_at],
        )
        .map_err(|e| InsightError::Cache(e.to_string()))?;

        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| InsightError::Cache(format!("Invalid TTL duration: {e}")))?;
        let cutoff_str = cutoff.to_rfc3339_opts(SecondsFormat::Nanos, true);

        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM response_cache WHERE cached_at < ?1",
                params![cutoff_str],
            )
            .map_err(|e| InsightError::Cache(e.to_string()))?;

        if deleted > 0 {
            debug!("Invalidated {} stale cache entries", deleted);
        }

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM response_cache", [])
            .map_err(|e| InsightError::Cache(e.to_string()))?;

        debug!("Cleared all cache entries");
        Ok(())
    }
}
