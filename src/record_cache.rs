//! Indirected record cache.
//!
//! A record body is stored once, under its primary key. Its height and every
//! secondary key hold a [`CacheEntry::Pointer`] to that primary key, so any of
//! the record's keys resolves in at most two store reads.
//!
//! ## Read path
//!
//! 1. Hash keys are read directly, heights are read from `"{kind}-{height}"`.
//! 2. A body entry is returned as is (one read).
//! 3. A pointer entry is followed once (two reads). If the body is gone the
//!    lookup falls through to the origin.
//! 4. Hash keys are shared by every kind; an entry written by another kind is
//!    a miss.
//! 5. On a miss the origin is called. Found records are written back under all
//!    of their keys; not-found results are never written.
//!
//! Head requests skip the read path but are written back like any other fetch.
//!
//! Store read failures count as misses and store write failures are logged and
//! dropped: the origin stays the source of truth. Entries that do not decode
//! are reported as [`CacheError::Corrupted`] instead of being treated as misses.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::codec::{decode_entry, encode_body, encode_pointer, CacheEntry};
use crate::error::{CacheError, CacheResult};
use crate::metrics;
use crate::origin::{Lookup, RecordOrigin};
use crate::record::{height_key, CacheableRecord, RecordKey};
use crate::store::{CacheStore, SetOptions};

/// Read-through cache for records with several keys.
#[derive(Clone)]
pub struct RecordCache {
    store: Arc<dyn CacheStore>,
    entry_options: SetOptions,
}

impl RecordCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            entry_options: SetOptions::default(),
        }
    }

    /// Apply `options` to every entry this cache writes. Bodies and pointers
    /// always share the same options so they age out together.
    pub fn with_entry_options(mut self, options: SetOptions) -> Self {
        self.entry_options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Fetch a record of `kind` by any of its keys, reading through to `origin`.
    ///
    /// Returns `Ok(None)` when the origin does not know the key.
    pub async fn fetch<R, O>(&self, kind: &str, key: &RecordKey, origin: &O) -> CacheResult<Option<R>>
    where
        R: CacheableRecord,
        O: RecordOrigin<R> + ?Sized,
    {
        if !key.is_head() {
            if let Some(record) = self.read_cached::<R>(kind, key).await? {
                return Ok(Some(record));
            }
            metrics::increment_cache_miss(kind);
        }

        self.fetch_from_origin(kind, key, origin).await
    }

    async fn read_cached<R: CacheableRecord>(&self, kind: &str, key: &RecordKey) -> CacheResult<Option<R>> {
        let slot = match key {
            RecordKey::Hash(hash) => hash.clone(),
            RecordKey::Height(height) => height_key(kind, *height),
            RecordKey::Head => return Ok(None),
        };

        let Some(raw) = self.read(&slot).await else {
            return Ok(None);
        };

        let Some(entry) = decode_entry::<R>(kind, &slot, &raw)? else {
            debug!("RecordCache: {} belongs to another kind, not {}", slot, kind);
            return Ok(None);
        };

        match entry {
            CacheEntry::Body { record, .. } => {
                debug!("RecordCache: {} hit for {} (1 read)", kind, slot);
                metrics::increment_cache_hit(kind, 1);
                Ok(Some(record))
            }
            CacheEntry::Pointer { primary_key, .. } => {
                let Some(raw) = self.read(&primary_key).await else {
                    debug!(
                        "RecordCache: {} pointer {} -> {} is dangling, refetching",
                        kind, slot, primary_key
                    );
                    metrics::increment_dangling_pointer(kind);
                    return Ok(None);
                };

                match decode_entry::<R>(kind, &primary_key, &raw)? {
                    Some(CacheEntry::Body { record, .. }) => {
                        debug!("RecordCache: {} hit for {} via {} (2 reads)", kind, slot, primary_key);
                        metrics::increment_cache_hit(kind, 2);
                        Ok(Some(record))
                    }
                    Some(CacheEntry::Pointer { .. }) => Err(CacheError::PointerChain { key: primary_key }),
                    None => {
                        debug!(
                            "RecordCache: {} pointer {} -> {} lands on another kind, refetching",
                            kind, slot, primary_key
                        );
                        metrics::increment_dangling_pointer(kind);
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn fetch_from_origin<R, O>(&self, kind: &str, key: &RecordKey, origin: &O) -> CacheResult<Option<R>>
    where
        R: CacheableRecord,
        O: RecordOrigin<R> + ?Sized,
    {
        metrics::increment_origin_fetch(kind);
        let start = Instant::now();
        let lookup = origin.fetch_record(key).await;
        metrics::record_origin_latency(kind, start.elapsed());

        match lookup.map_err(CacheError::Origin)? {
            Lookup::NotFound => {
                debug!("RecordCache: {} {} not found at origin", kind, key);
                metrics::increment_not_found(kind);
                Ok(None)
            }
            Lookup::Found(record) => {
                self.populate(kind, &record).await;
                Ok(Some(record))
            }
        }
    }

    /// Write `record` under its primary key, height key and secondary keys.
    ///
    /// All writes are issued concurrently and are best-effort. Returns the
    /// number of entries actually written.
    pub async fn populate<R: CacheableRecord>(&self, kind: &str, record: &R) -> usize {
        let primary_key = record.primary_key();

        let (body, pointer) = match (encode_body(kind, record), encode_pointer(kind, primary_key)) {
            (Ok(body), Ok(pointer)) => (body, pointer),
            (Err(e), _) | (_, Err(e)) => {
                warn!("RecordCache: failed to encode {} {}: {}", kind, primary_key, e);
                return 0;
            }
        };

        let writes = entry_keys(kind, record)
            .into_iter()
            .enumerate()
            .map(|(i, key)| {
                let value = if i == 0 { body.clone() } else { pointer.clone() };
                async move {
                    let result = self.store.set(&key, value, self.entry_options).await;
                    (key, result)
                }
            });

        let mut written = 0;
        for (key, result) in join_all(writes).await {
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!("RecordCache: failed to write {} entry {}: {:#}", kind, key, e);
                    metrics::increment_store_error(self.store.backend(), "set");
                }
            }
        }

        debug!("RecordCache: cached {} {} under {} keys", kind, primary_key, written);
        written
    }

    /// Remove every entry belonging to `record`.
    pub async fn invalidate<R: CacheableRecord>(&self, kind: &str, record: &R) -> CacheResult<()> {
        for key in entry_keys(kind, record) {
            self.store.delete(&key).await.map_err(CacheError::Store)?;
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("RecordCache: read of {} failed, treating as miss: {:#}", key, e);
                metrics::increment_store_error(self.store.backend(), "get");
                None
            }
        }
    }
}

/// Keys owned by `record`: primary first, then height, then secondaries.
/// Secondary keys equal to the primary key are skipped so a pointer never
/// overwrites the body.
fn entry_keys<R: CacheableRecord>(kind: &str, record: &R) -> Vec<String> {
    let primary_key = record.primary_key();
    let secondary_keys = record.secondary_keys();

    let mut keys = Vec::with_capacity(2 + secondary_keys.len());
    keys.push(primary_key.to_string());
    keys.push(height_key(kind, record.height()));
    for secondary in secondary_keys {
        if secondary.is_empty() || secondary == primary_key || keys.iter().any(|k| k == secondary) {
            continue;
        }
        keys.push(secondary.to_string());
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        hash: String,
        height: u64,
        alt: Vec<String>,
    }

    impl CacheableRecord for Rec {
        fn primary_key(&self) -> &str {
            &self.hash
        }
        fn height(&self) -> u64 {
            self.height
        }
        fn secondary_keys(&self) -> Vec<&str> {
            self.alt.iter().map(String::as_str).collect()
        }
    }

    fn rec(hash: &str, height: u64, alt: &[&str]) -> Rec {
        Rec {
            hash: hash.to_string(),
            height,
            alt: alt.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_entry_keys_skip_primary_and_duplicates() {
        let r = rec("P", 3, &["S", "P", "", "S"]);
        assert_eq!(entry_keys("k", &r), vec!["P", "k-3", "S"]);
    }

    #[tokio::test]
    async fn test_populate_writes_body_and_pointers() {
        let store = Arc::new(MemoryStore::unbounded());
        let cache = RecordCache::new(store.clone());

        let written = cache.populate("k", &rec("P", 3, &["S"])).await;
        assert_eq!(written, 3);

        let pointer = CacheEntry::Pointer {
            kind: "k".to_string(),
            primary_key: "P".to_string(),
        };
        let body: CacheEntry<Rec> = decode_entry("k", "P", &store.peek("P").unwrap()).unwrap().unwrap();
        assert!(!body.is_pointer());
        let height: Option<CacheEntry<Rec>> = decode_entry("k", "k-3", &store.peek("k-3").unwrap()).unwrap();
        assert_eq!(height, Some(pointer.clone()));
        let secondary: Option<CacheEntry<Rec>> = decode_entry("k", "S", &store.peek("S").unwrap()).unwrap();
        assert_eq!(secondary, Some(pointer));
    }

    #[tokio::test]
    async fn test_invalidate_removes_all_entries() {
        let store = Arc::new(MemoryStore::unbounded());
        let cache = RecordCache::new(store.clone());
        let r = rec("P", 3, &["S"]);

        cache.populate("k", &r).await;
        assert_eq!(store.len(), 3);

        cache.invalidate("k", &r).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_pointer_to_pointer_is_reported() {
        let store = Arc::new(MemoryStore::unbounded());
        store
            .set("k-1", encode_pointer("k", "A").unwrap(), SetOptions::default())
            .await
            .unwrap();
        store
            .set("A", encode_pointer("k", "B").unwrap(), SetOptions::default())
            .await
            .unwrap();

        let cache = RecordCache::new(store);
        let err = cache
            .read_cached::<Rec>("k", &RecordKey::Height(1))
            .await
            .unwrap_err();
        assert!(err.is_corruption());
    }
}
