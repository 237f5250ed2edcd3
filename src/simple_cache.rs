//! Read-through cache for values with exactly one key (balances, receipts).
//!
//! No indirection: a hit is one read, a miss is one origin call plus at most
//! one write. `None` from the origin is returned but never cached.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::codec::{decode_value, encode_value};
use crate::error::{CacheError, CacheResult};
use crate::metrics;
use crate::origin::ValueOrigin;
use crate::store::{CacheStore, SetOptions};

/// Default number of concurrent single-key fetches in [`SimpleCache::fetch_many`].
pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

#[derive(Clone)]
pub struct SimpleCache {
    store: Arc<dyn CacheStore>,
    name: &'static str,
}

impl SimpleCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            name: "simple",
        }
    }

    /// Label used in logs and metrics.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Fetch `key`, reading through to `origin` on a miss.
    pub async fn fetch<V, O>(&self, key: &str, origin: &O, options: SetOptions) -> CacheResult<Option<V>>
    where
        V: Serialize + DeserializeOwned + Send,
        O: ValueOrigin<V> + ?Sized,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => {
                let value = decode_value(key, &raw)?;
                metrics::increment_cache_hit(self.name, 1);
                return Ok(Some(value));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("SimpleCache: read of {} failed, treating as miss: {:#}", key, e);
                metrics::increment_store_error(self.store.backend(), "get");
            }
        }
        metrics::increment_cache_miss(self.name);

        metrics::increment_origin_fetch(self.name);
        let start = Instant::now();
        let fetched = origin.fetch_value(key).await;
        metrics::record_origin_latency(self.name, start.elapsed());

        let Some(value) = fetched.map_err(CacheError::Origin)? else {
            debug!("SimpleCache: {} not found at origin", key);
            metrics::increment_not_found(self.name);
            return Ok(None);
        };

        match encode_value(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.set(key, raw, options).await {
                    warn!("SimpleCache: failed to write {}: {:#}", key, e);
                    metrics::increment_store_error(self.store.backend(), "set");
                }
            }
            Err(e) => warn!("SimpleCache: failed to encode {}: {}", key, e),
        }

        Ok(Some(value))
    }

    /// Fetch every key in `keys`, preserving order, with at most
    /// `concurrency` fetches in flight (0 is treated as 1).
    ///
    /// The first origin error fails the whole batch.
    pub async fn fetch_many<V, O, K>(
        &self,
        keys: &[K],
        origin: &O,
        options: SetOptions,
        concurrency: usize,
    ) -> CacheResult<Vec<Option<V>>>
    where
        V: Serialize + DeserializeOwned + Send,
        O: ValueOrigin<V> + ?Sized,
        K: AsRef<str>,
    {
        stream::iter(keys.iter().map(|key| self.fetch(key.as_ref(), origin, options)))
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}
