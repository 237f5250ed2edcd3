//! Error types surfaced by the record and simple caches.

/// Errors returned by [`RecordCache`](crate::record_cache::RecordCache),
/// [`SimpleCache`](crate::simple_cache::SimpleCache) and the
/// [`LedgerCache`](crate::ledger_cache::LedgerCache) facade.
///
/// "Not found" is not an error: lookups that the origin cannot resolve come
/// back as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cached value could not be decoded. The store holds data this crate
    /// did not write (or wrote with an incompatible layout).
    #[error("cache entry `{key}` is corrupted ({source}); flush the cache and retry")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// A pointer entry resolved to another pointer instead of a record body.
    #[error("cache entry `{key}` points to another pointer; flush the cache and retry")]
    PointerChain { key: String },
    /// The record origin failed for a reason other than "not found".
    #[error("origin fetch failed: {0}")]
    Origin(#[source] anyhow::Error),
    /// The cache store itself failed. Only returned by operations that talk to
    /// the store directly; the read-through paths degrade instead.
    #[error("cache store failed: {0}")]
    Store(#[source] anyhow::Error),
}

impl CacheError {
    /// True when the error means the store contents cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, CacheError::Corrupted { .. } | CacheError::PointerChain { .. })
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
