// src/cache.rs
//! Key-value cache layer. Redis in production, an in-process map for tests and
//! dry runs. Values are the JSON text of normalized records.

use crate::error::{PollerError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// URL scheme that selects [`MemoryCache`] instead of Redis.
pub const MEMORY_URL: &str = "memory://";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Creates or overwrites `key`. `None` stores without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Whole-value overwrite; there is no field-level merge.
    async fn update(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.set(key, value, ttl).await
    }
}

/// Opens the store named by `url`: `memory://` or any `redis://` URL.
pub async fn open_store(url: &str) -> Result<Arc<dyn KeyValueStore>> {
    if url.starts_with(MEMORY_URL) {
        info!("Using in-process memory cache; nothing is persisted");
        return Ok(Arc::new(MemoryCache::new()));
    }
    Ok(Arc::new(RedisCache::new(url)?))
}

// Initial connect attempts per cycle; the next tick tries again.
const CONNECT_RETRIES: usize = 1;
const CONNECT_BACKOFF_BASE: u64 = 2;
const CONNECT_BACKOFF_FACTOR_MS: u64 = 100;

/// A Redis cache client.
/// The `ConnectionManager` is created on first use, so an unreachable server
/// shows up as a per-cycle `CacheError` rather than a startup failure. Once
/// created, the manager reconnects on its own.
pub struct RedisCache {
    client: redis::Client,
    conn_manager: OnceCell<ConnectionManager>,
    redis_url: String,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("redis_url", &self.redis_url)
            .field("connected", &self.conn_manager.initialized())
            .finish()
    }
}

impl RedisCache {
    /// Validates the URL only; no connection is attempted here.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            PollerError::ConfigError(format!("Invalid REDIS_URL '{}': {}", redis_url, e))
        })?;
        Ok(Self {
            client,
            conn_manager: OnceCell::new(),
            redis_url: redis_url.to_string(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .conn_manager
            .get_or_try_init(|| async {
                info!("Initializing Redis connection manager for URL: {}", self.redis_url);
                let manager = ConnectionManager::new_with_backoff(
                    self.client.clone(),
                    CONNECT_BACKOFF_BASE,
                    CONNECT_BACKOFF_FACTOR_MS,
                    CONNECT_RETRIES,
                )
                .await
                .map_err(|e| {
                    error!("Failed to create Redis ConnectionManager: {}", e);
                    PollerError::CacheError(format!(
                        "Failed to create Redis ConnectionManager: {}",
                        e
                    ))
                })?;
                info!("Redis ConnectionManager initialized successfully.");
                Ok::<_, PollerError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl KeyValueStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        debug!("Attempting to GET cache for key: {}", key);
        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => {
                debug!("Cache {} for key: {}", if value.is_some() { "HIT" } else { "MISS" }, key);
                Ok(value)
            }
            Err(e) => {
                error!("Redis GET error for key {}: {}", key, e);
                Err(e.into())
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;
        let outcome = match ttl.map(|t| t.as_secs()).filter(|secs| *secs > 0) {
            Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        match outcome {
            Ok(()) => {
                debug!("Cache SET success for key: {} (ttl: {:?})", key, ttl);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to SET key '{}' in Redis: {}", key, e);
                Err(e.into())
            }
        }
    }
}

/// DashMap-backed store with lazy TTL expiry on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().1.map_or(true, |deadline| deadline > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted keys of live (unexpired) entries.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().1.map_or(true, |deadline| deadline > now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => match entry.1 {
                Some(deadline) if deadline <= Instant::now() => true,
                _ => return Ok(Some(entry.0.clone())),
            },
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let deadline = ttl.filter(|t| !t.is_zero()).map(|t| Instant::now() + t);
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_set_and_update() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("todo:1").await.unwrap(), None);

        cache.set("todo:1", r#"{"id":1}"#, None).await.unwrap();
        assert_eq!(cache.get("todo:1").await.unwrap().as_deref(), Some(r#"{"id":1}"#));

        cache.update("todo:1", r#"{"id":1,"completed":true}"#, None).await.unwrap();
        assert_eq!(
            cache.get("todo:1").await.unwrap().as_deref(),
            Some(r#"{"id":1,"completed":true}"#)
        );
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expires_entry() {
        let cache = MemoryCache::new();
        cache
            .set("weather:London", "{}", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(cache.get("weather:London").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("weather:London").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_keys_skip_expired_entries() {
        let cache = MemoryCache::new();
        cache
            .set("weather:London", "{}", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache.set("flight:MU2557", "{}", None).await.unwrap();
        assert_eq!(cache.keys().len(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.keys(), vec!["flight:MU2557".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_per_call_not_at_open() {
        // Port 1 refuses connections; opening must still succeed.
        let store = open_store("redis://127.0.0.1:1/0").await.unwrap();

        let err = store.get("flight:MU2557").await.unwrap_err();
        assert_eq!(err.category(), "cache");
        let err = store.set("flight:MU2557", "{}", None).await.unwrap_err();
        assert_eq!(err.category(), "cache");
    }

    #[tokio::test]
    async fn test_malformed_redis_url_is_config_error() {
        let err = open_store("not-a-redis-url").await.err().expect("expected error");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_zero_ttl_means_no_expiry() {
        let cache = MemoryCache::new();
        cache.set("flight:MU2557", "{}", Some(Duration::ZERO)).await.unwrap();
        assert!(cache.get("flight:MU2557").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_store_memory_url() {
        let store = open_store(MEMORY_URL).await.unwrap();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
