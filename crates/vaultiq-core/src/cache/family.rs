//! `FamilyCache` — the per-family typed handle over a [`CacheProvider`]
//! with "silent no-op when the named cache is absent" semantics.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::provider::{self, CacheProvider};
use crate::error::Result;

/// A typed, per-family cache handle. Constructed once at startup.
///
/// When `provider` is `None` (the family's named cache could not be
/// resolved, or caching is disabled for the family), every operation
/// is a silent no-op returning the neutral value — this lets the
/// Session Store execute uniformly whether caching is configured or not.
#[derive(Clone)]
pub struct FamilyCache<T> {
    provider: Option<Arc<dyn CacheProvider>>,
    family_name: &'static str,
    _marker: PhantomData<T>,
}

impl<T> FamilyCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Construct a live cache handle backed by `provider`.
    pub fn live(family_name: &'static str, provider: Arc<dyn CacheProvider>) -> Self {
        info!(family = family_name, "cache initialized for family");
        Self {
            provider: Some(provider),
            family_name,
            _marker: PhantomData,
        }
    }

    /// Construct a handle that silently no-ops every operation, because
    /// the family's named cache was absent at construction time.
    pub fn absent(family_name: &'static str) -> Self {
        info!(
            family = family_name,
            "cache absent for family, falling back to silent no-op"
        );
        Self {
            provider: None,
            family_name,
            _marker: PhantomData,
        }
    }

    pub fn is_active(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn put(&self, key: &str, value: &T) -> Result<()> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };
        provider::put(provider.as_ref(), key, value).await?;
        debug!(family = self.family_name, key, "cache put");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>> {
        let Some(provider) = &self.provider else {
            return Ok(None);
        };
        let value = provider::get(provider.as_ref(), key).await?;
        debug!(family = self.family_name, key, hit = value.is_some(), "cache get");
        Ok(value)
    }

    pub async fn evict(&self, key: &str) -> Result<bool> {
        let Some(provider) = &self.provider else {
            return Ok(false);
        };
        let evicted = provider.evict(key).await?;
        debug!(family = self.family_name, key, evicted, "cache evict");
        Ok(evicted)
    }

    pub async fn multi_get(&self, keys: &[String]) -> Result<HashMap<String, T>> {
        let Some(provider) = &self.provider else {
            return Ok(HashMap::new());
        };
        let values = provider::multi_get(provider.as_ref(), keys).await?;
        debug!(
            family = self.family_name,
            requested = keys.len(),
            found = values.len(),
            "cache multi_get"
        );
        Ok(values)
    }

    pub async fn multi_evict(&self, keys: &[String]) -> Result<usize> {
        let Some(provider) = &self.provider else {
            return Ok(0);
        };
        let count = provider.multi_evict(keys).await?;
        debug!(family = self.family_name, count, "cache multi_evict");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::provider::InMemoryCacheProvider;

    #[tokio::test]
    async fn absent_cache_is_silent_no_op() {
        let cache: FamilyCache<String> = FamilyCache::absent("session");
        assert!(!cache.is_active());
        cache.put("k", &"v".to_string()).await.expect("put");
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert!(!cache.evict("k").await.expect("evict"));
        assert_eq!(cache.multi_evict(&["k".into()]).await.expect("multi_evict"), 0);
    }

    #[tokio::test]
    async fn live_cache_round_trips() {
        let provider: Arc<dyn CacheProvider> = Arc::new(InMemoryCacheProvider::new());
        let cache: FamilyCache<String> = FamilyCache::live("session", provider);
        cache.put("k", &"v".to_string()).await.expect("put");
        assert_eq!(cache.get("k").await.expect("get"), Some("v".to_string()));
        assert!(cache.evict("k").await.expect("evict"));
        assert_eq!(cache.get("k").await.expect("get"), None);
    }
}
