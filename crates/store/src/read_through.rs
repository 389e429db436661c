use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;
use ttsrelay_protocol::{Channel, STATE_CACHE_TTL_SECS};

use crate::{cache::TtlCache, channel_store::SqliteChannelStore, error::Result};

/// Read-through cache over channel configs (§4.6): reads consult the cache
/// first, populate it on miss, and writes invalidate the entry immediately.
/// All reads outside the lease and snapshot operations tolerate staleness up
/// to `STATE_CACHE_TTL_SECS`.
pub struct CachedChannelStore {
    inner: SqliteChannelStore,
    cache: RwLock<TtlCache<String, Arc<Channel>>>,
}

impl CachedChannelStore {
    pub fn new(inner: SqliteChannelStore) -> Self {
        Self {
            inner,
            cache: RwLock::new(TtlCache::new(
                Duration::from_secs(STATE_CACHE_TTL_SECS),
                10_000,
            )),
        }
    }

    pub async fn get(&self, login: &str) -> Result<Option<Arc<Channel>>> {
        let key = login.to_lowercase();
        {
            let mut cache = self.cache.write().await;
            cache.evict_expired();
            if let Some(hit) = cache.get(&key) {
                return Ok(Some(Arc::clone(hit)));
            }
        }
        let loaded = self.inner.get(&key).await?.map(Arc::new);
        if let Some(channel) = &loaded {
            self.cache.write().await.insert(key, Arc::clone(channel));
        }
        Ok(loaded)
    }

    pub async fn upsert(&self, channel: &Channel) -> Result<()> {
        self.inner.upsert(channel).await?;
        self.cache.write().await.remove(&channel.login.to_lowercase());
        Ok(())
    }

    pub async fn delete(&self, login: &str) -> Result<()> {
        self.inner.delete(login).await?;
        self.cache.write().await.remove(&login.to_lowercase());
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn test_store() -> CachedChannelStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::schema::init(&pool).await.unwrap();
        CachedChannelStore::new(SqliteChannelStore::new(pool))
    }

    #[tokio::test]
    async fn upsert_invalidates_cached_entry() {
        let store = test_store().await;
        let mut ch = Channel::new("c");
        store.upsert(&ch).await.unwrap();
        assert!(!store.get("c").await.unwrap().unwrap().engine_enabled);

        ch.engine_enabled = true;
        store.upsert(&ch).await.unwrap();
        assert!(store.get("c").await.unwrap().unwrap().engine_enabled);
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let store = test_store().await;
        let ch = Channel::new("c");
        store.upsert(&ch).await.unwrap();

        let first = store.get("c").await.unwrap().unwrap();
        let second = store.get("c").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
