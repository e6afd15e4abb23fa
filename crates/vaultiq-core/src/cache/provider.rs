//! Named key/value cache infrastructure handle.
//!
//! `CacheProvider` is the thin trait the core consumes; `RedisCacheProvider`
//! and `InMemoryCacheProvider` are the two implementations shipped here,
//! grounded on `TechieQuokka-chat_server_rust`'s `Cache`/`RedisCache` split.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Host-supplied cache infrastructure: "get a named cache by
/// string name; return null if absent." The core consumes this and
/// nothing else from the cache provider.
pub trait CacheInfrastructure: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<dyn CacheProvider>>;
}

/// A [`CacheInfrastructure`] backed by a fixed, pre-registered map of
/// named caches. Convenient for wiring a handful of Redis/in-memory
/// caches up at startup.
#[derive(Clone, Default)]
pub struct StaticCacheInfrastructure {
    caches: HashMap<String, Arc<dyn CacheProvider>>,
}

impl StaticCacheInfrastructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, provider: Arc<dyn CacheProvider>) -> Self {
        self.caches.insert(name.into(), provider);
        self
    }
}

impl CacheInfrastructure for StaticCacheInfrastructure {
    fn get(&self, name: &str) -> Option<Arc<dyn CacheProvider>> {
        self.caches.get(name).cloned()
    }
}

/// A named key/value cache. Implementations must be cheap to clone and
/// safe to share across tasks.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn put_raw(&self, key: &str, value: &[u8]) -> Result<()>;
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn evict(&self, key: &str) -> Result<bool>;
    async fn multi_get_raw(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>>;
    async fn multi_evict(&self, keys: &[String]) -> Result<usize>;
}

/// Convenience JSON-typed wrappers layered over the raw byte operations,
/// so call sites never touch serialization directly.
pub async fn put<T: Serialize + Sync>(
    provider: &dyn CacheProvider,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    provider.put_raw(key, &bytes).await
}

pub async fn get<T: DeserializeOwned>(
    provider: &dyn CacheProvider,
    key: &str,
) -> Result<Option<T>> {
    match provider.get_raw(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn multi_get<T: DeserializeOwned>(
    provider: &dyn CacheProvider,
    keys: &[String],
) -> Result<HashMap<String, T>> {
    let raw = provider.multi_get_raw(keys).await?;
    let mut out = HashMap::with_capacity(raw.len());
    for (k, bytes) in raw {
        out.insert(k, serde_json::from_slice(&bytes)?);
    }
    Ok(out)
}

/// Redis-backed cache provider.
#[derive(Clone)]
pub struct RedisCacheProvider {
    conn: ConnectionManager,
}

impl RedisCacheProvider {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn put_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn evict(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn multi_get_raw(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = conn.mget(keys).await?;
        let mut out = HashMap::new();
        for (key, value) in keys.iter().zip(values) {
            if let Some(value) = value {
                out.insert(key.clone(), value);
            }
        }
        Ok(out)
    }

    async fn multi_evict(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(keys).await?;
        Ok(deleted as usize)
    }
}

/// In-memory cache provider for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryCacheProvider {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheProvider for InMemoryCacheProvider {
    async fn put_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        self.inner.write().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn evict(&self, key: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(key).is_some())
    }

    async fn multi_get_raw(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let guard = self.inner.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| guard.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn multi_evict(&self, keys: &[String]) -> Result<usize> {
        let mut guard = self.inner.write().await;
        Ok(keys.iter().filter(|k| guard.remove(*k).is_some()).count())
    }
}
