//! Caller-facing facade over the record cache, the simple cache and an origin.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::error::CacheResult;
use crate::node::NodeClient;
use crate::origin::{RecordOrigin, ValueOrigin};
use crate::record::{LedgerRecord, RecordKey};
use crate::record_cache::RecordCache;
use crate::settings::{CacheSettings, Settings};
use crate::simple_cache::{SimpleCache, DEFAULT_BATCH_CONCURRENCY};
use crate::store::{build_store, CacheStore, SetOptions};
use crate::values::SimpleValue;

/// Read-through access to ledger records and simple values.
///
/// `N` is the origin; any type implementing [`RecordOrigin`] for the record
/// kinds and [`ValueOrigin`] for the values a caller asks for.
pub struct LedgerCache<N> {
    records: RecordCache,
    values: SimpleCache,
    origin: N,
    value_options: SetOptions,
    expiring_value_options: SetOptions,
    batch_concurrency: usize,
}

impl<N> LedgerCache<N> {
    /// Build with default settings: no TTL on records or immutable values,
    /// the default balance TTL, and the default batch concurrency.
    pub fn new(store: Arc<dyn CacheStore>, origin: N) -> Self {
        Self {
            records: RecordCache::new(store.clone()),
            values: SimpleCache::new(store).with_name("values"),
            origin,
            value_options: SetOptions::default(),
            expiring_value_options: SetOptions::from_secs(Some(
                CacheSettings::default().balance_ttl_seconds,
            )),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Apply cache and batch settings.
    pub fn configure(mut self, settings: &Settings) -> Self {
        let entry_options = SetOptions::from_secs(settings.cache.default_ttl_seconds);
        self.records = self.records.with_entry_options(entry_options);
        self.value_options = entry_options;
        self.expiring_value_options = SetOptions::from_secs(Some(settings.cache.balance_ttl_seconds));
        self.batch_concurrency = settings.batch.concurrency.max(1);
        self
    }

    pub fn records(&self) -> &RecordCache {
        &self.records
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        self.records.store()
    }

    pub fn origin(&self) -> &N {
        &self.origin
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    /// Fetch a record of kind `R` by hash, height or head.
    pub async fn fetch_record<R>(&self, key: RecordKey) -> CacheResult<Option<R>>
    where
        R: LedgerRecord,
        N: RecordOrigin<R>,
    {
        self.records.fetch(R::KIND, &key, &self.origin).await
    }

    /// Fetch the current head of kind `R`, then make it reachable by its keys.
    pub async fn fetch_head<R>(&self) -> CacheResult<Option<R>>
    where
        R: LedgerRecord,
        N: RecordOrigin<R>,
    {
        self.fetch_record(RecordKey::Head).await
    }

    /// Fetch a simple value by its unnamespaced key (an address, an entry hash).
    pub async fn fetch_simple<V>(&self, key: &str) -> CacheResult<Option<V>>
    where
        V: SimpleValue,
        N: ValueOrigin<V>,
    {
        let origin = Unprefixed(&self.origin);
        self.values
            .fetch(&V::cache_key(key), &origin, self.options_for::<V>())
            .await
    }

    /// Fetch many simple values in input order. `concurrency` defaults to the
    /// configured batch concurrency.
    pub async fn fetch_simple_many<V, K>(&self, keys: &[K], concurrency: Option<usize>) -> CacheResult<Vec<Option<V>>>
    where
        V: SimpleValue,
        N: ValueOrigin<V>,
        K: AsRef<str>,
    {
        let origin = Unprefixed(&self.origin);
        let cache_keys: Vec<String> = keys.iter().map(|key| V::cache_key(key.as_ref())).collect();
        self.values
            .fetch_many(
                &cache_keys,
                &origin,
                self.options_for::<V>(),
                concurrency.unwrap_or(self.batch_concurrency),
            )
            .await
    }

    /// Drop every cache entry of `record` (body, height and secondary pointers).
    pub async fn invalidate_record<R: LedgerRecord>(&self, record: &R) -> CacheResult<()> {
        self.records.invalidate(R::KIND, record).await
    }

    fn options_for<V: SimpleValue>(&self) -> SetOptions {
        if V::EXPIRES {
            self.expiring_value_options
        } else {
            self.value_options
        }
    }
}

impl LedgerCache<NodeClient> {
    /// Build the configured store and node client.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let store = build_store(&settings.cache).await?;
        let node = NodeClient::new(&settings.node)?;
        info!(
            "LedgerCache ready: {} store, node {}",
            store.backend(),
            node.url()
        );
        Ok(Self::new(store, node).configure(settings))
    }
}

/// Strips the value namespace before the key reaches the origin.
struct Unprefixed<'a, N>(&'a N);

#[async_trait]
impl<'a, V, N> ValueOrigin<V> for Unprefixed<'a, N>
where
    V: SimpleValue + 'static,
    N: ValueOrigin<V>,
{
    async fn fetch_value(&self, key: &str) -> Result<Option<V>> {
        let raw = key
            .strip_prefix(V::NAMESPACE)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key);
        self.0.fetch_value(raw).await
    }
}
