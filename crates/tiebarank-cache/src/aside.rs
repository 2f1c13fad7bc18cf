//! Read-through caching: serve a cached value or produce, store and return it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use tiebarank_core::RankError;

use crate::error::{CacheError, Result};
use crate::store::KvStore;

/// Typed accessor over a [`KvStore`]. Values are stored as JSON under
/// `prefix + key`.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Cached value for `key`, or `None` on a miss. Corrupt entries are errors.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(&self.key(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(&self.key(key), bytes, ttl).await
    }

    /// Serve `key` from the cache, falling back to `producer`.
    ///
    /// Store failures and corrupt entries count as misses. A producer error
    /// is returned as-is and nothing is cached. Failing to store a fresh
    /// value is logged and the value is still returned.
    pub async fn get_or_produce<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> std::result::Result<T, RankError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, RankError>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => {
                debug!(key, "cache hit");
                return Ok(value);
            }
            Ok(None) => debug!(key, "cache miss"),
            Err(e @ CacheError::Serialization(_)) => {
                warn!(key, error = %e, "discarding corrupt cache entry");
            }
            Err(e) => warn!(key, error = %e, "cache read failed"),
        }

        let value = producer().await?;
        if let Err(e) = self.set(key, &value, ttl).await {
            warn!(key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    /// Counter helpers; a missing or unreadable counter reads as `None`.
    pub async fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get::<u64>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "counter unreadable");
                None
            }
        }
    }

    pub async fn set_u64(&self, key: &str, value: u64, ttl: Duration) -> Result<()> {
        self.set(key, &value, ttl).await
    }
}
