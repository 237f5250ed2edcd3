//! Origin traits: the authoritative sources queried on a cache miss.

use anyhow::Result;
use async_trait::async_trait;

use crate::record::RecordKey;

/// Result of an origin lookup. Absence is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<R> {
    Found(R),
    NotFound,
}

impl<R> Lookup<R> {
    pub fn into_option(self) -> Option<R> {
        match self {
            Lookup::Found(record) => Some(record),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<R> From<Option<R>> for Lookup<R> {
    fn from(value: Option<R>) -> Self {
        match value {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        }
    }
}

/// Source of records for the indirected cache.
///
/// Errors are reserved for real failures (network, protocol); a key that does
/// not resolve (yet) must come back as [`Lookup::NotFound`].
#[async_trait]
pub trait RecordOrigin<R>: Send + Sync {
    async fn fetch_record(&self, key: &RecordKey) -> Result<Lookup<R>>;
}

/// Source of single-key values for the simple cache. `Ok(None)` is not found.
#[async_trait]
pub trait ValueOrigin<V>: Send + Sync {
    async fn fetch_value(&self, key: &str) -> Result<Option<V>>;
}
