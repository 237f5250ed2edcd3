// Cache Store - key/value backends for the record and simple caches
// Values are opaque strings; serialization is owned by the codec layer.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::settings::{CacheBackend, CacheSettings};

/// Options applied to a single `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expire the entry after this long. `None` leaves retention to the store.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    /// Build options from an optional number of seconds (settings use seconds).
    pub fn from_secs(ttl_seconds: Option<u64>) -> Self {
        Self {
            ttl: ttl_seconds.map(Duration::from_secs),
        }
    }
}

/// Asynchronous string key/value store.
///
/// Implementations must provide atomic single-key `get`/`set`; nothing in this
/// crate relies on multi-key atomicity.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, options: SetOptions) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Short backend name used in logs and metric labels.
    fn backend(&self) -> &'static str;
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |deadline| now >= deadline)
    }
}

#[derive(Default)]
struct StoreMetrics {
    gets: AtomicU64,
    hits: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    expirations: AtomicU64,
}

/// Point-in-time view of a [`MemoryStore`]'s operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub expirations: u64,
}

/// In-process store: bounded LRU with optional per-entry TTL.
///
/// Expired entries are dropped lazily, on the read that finds them.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, StoredValue>>,
    metrics: StoreMetrics,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            metrics: StoreMetrics::default(),
        }
    }

    /// Create a store without a size bound (tests, short-lived tools).
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            metrics: StoreMetrics::default(),
        }
    }

    /// Check for a live entry without touching counters or recency.
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .peek(key)
            .map_or(false, |entry| !entry.is_expired(Instant::now()))
    }

    /// Read a raw value without touching counters or recency.
    pub fn peek(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .peek(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn metrics(&self) -> StoreMetricsSnapshot {
        let gets = self.metrics.gets.load(Ordering::Relaxed);
        let hits = self.metrics.hits.load(Ordering::Relaxed);
        StoreMetricsSnapshot {
            gets,
            hits,
            misses: gets.saturating_sub(hits),
            sets: self.metrics.sets.load(Ordering::Relaxed),
            deletes: self.metrics.deletes.load(Ordering::Relaxed),
            expirations: self.metrics.expirations.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, StoredValue>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.metrics.gets.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut entries = self.lock()?;

        let lookup = entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match lookup {
            Some(Some(value)) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Some(None) => {
                entries.pop(key);
                self.metrics.expirations.fetch_add(1, Ordering::Relaxed);
                debug!("MemoryStore: entry {} expired", key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, options: SetOptions) -> Result<()> {
        self.metrics.sets.fetch_add(1, Ordering::Relaxed);
        let stored = StoredValue {
            value,
            expires_at: options.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.lock()?.put(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.metrics.deletes.fetch_add(1, Ordering::Relaxed);
        self.lock()?.pop(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Build the store selected by configuration.
pub async fn build_store(settings: &CacheSettings) -> Result<Arc<dyn CacheStore>> {
    match settings.backend {
        CacheBackend::Memory => {
            info!(
                "Using in-memory cache store (capacity {})",
                settings.memory_capacity
            );
            Ok(Arc::new(MemoryStore::new(settings.memory_capacity)))
        }
        CacheBackend::Redis => build_redis_store(settings).await,
    }
}

#[cfg(feature = "redis")]
async fn build_redis_store(settings: &CacheSettings) -> Result<Arc<dyn CacheStore>> {
    let store = crate::redis_store::RedisStore::connect(&settings.redis_url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn build_redis_store(_settings: &CacheSettings) -> Result<Arc<dyn CacheStore>> {
    Err(anyhow!(
        "Redis feature not enabled. Enable with 'redis' feature flag."
    ))
}
