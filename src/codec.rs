//! Serialization of records and values to the store's string values.
//!
//! Record entries are written as a tagged [`CacheEntry`] carrying the record
//! kind, so a reader never has to guess whether a value is a pointer or a body
//! from its shape, nor which kind of record wrote it. Hash and secondary keys
//! share one key space across kinds; an entry of another kind is a miss, not
//! corruption.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, CacheResult};

/// One value in the record key space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEntry<R> {
    /// Full record, stored under its primary key.
    Body { kind: String, record: R },
    /// Primary key of a record, stored under a height or secondary key.
    Pointer { kind: String, primary_key: String },
}

impl<R> CacheEntry<R> {
    pub fn kind(&self) -> &str {
        match self {
            CacheEntry::Body { kind, .. } | CacheEntry::Pointer { kind, .. } => kind,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CacheEntry::Pointer { .. })
    }
}

/// Encode a record body entry.
pub fn encode_body<R: Serialize>(kind: &str, record: &R) -> serde_json::Result<String> {
    serde_json::to_string(&CacheEntry::Body {
        kind: kind.to_string(),
        record,
    })
}

/// Encode a pointer entry.
pub fn encode_pointer(kind: &str, primary_key: &str) -> serde_json::Result<String> {
    serde_json::to_string(&CacheEntry::<()>::Pointer {
        kind: kind.to_string(),
        primary_key: primary_key.to_string(),
    })
}

/// Decode an entry read from `key` on behalf of `kind`.
///
/// Returns `Ok(None)` for a well-formed entry written by another kind. Input
/// that is not a tagged entry, or a body of `kind` that does not decode as
/// `R`, is corruption.
pub fn decode_entry<R: DeserializeOwned>(
    kind: &str,
    key: &str,
    raw: &str,
) -> CacheResult<Option<CacheEntry<R>>> {
    let corrupted = |source: serde_json::Error| CacheError::Corrupted {
        key: key.to_string(),
        source,
    };

    let entry: CacheEntry<Value> = serde_json::from_str(raw).map_err(corrupted)?;
    if entry.kind() != kind {
        return Ok(None);
    }

    match entry {
        CacheEntry::Body { kind, record } => {
            let record = serde_json::from_value(record).map_err(corrupted)?;
            Ok(Some(CacheEntry::Body { kind, record }))
        }
        CacheEntry::Pointer { kind, primary_key } => {
            Ok(Some(CacheEntry::Pointer { kind, primary_key }))
        }
    }
}

/// Encode a plain value for the simple cache.
pub fn encode_value<V: Serialize>(value: &V) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Decode a plain value read from `key`. Any parse failure is corruption.
pub fn decode_value<V: DeserializeOwned>(key: &str, raw: &str) -> CacheResult<V> {
    serde_json::from_str(raw).map_err(|source| CacheError::Corrupted {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Block {
        hash: String,
        height: u64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Other {
        lookup: String,
    }

    #[test]
    fn test_body_and_pointer_are_distinguishable() {
        // A body whose fields look like a hash must still decode as a body
        let block = Block {
            hash: "a".repeat(64),
            height: 1,
        };
        let body = encode_body("dblock", &block).unwrap();
        let pointer = encode_pointer("dblock", &block.hash).unwrap();

        let decoded: Option<CacheEntry<Block>> = decode_entry("dblock", "k", &body).unwrap();
        assert_eq!(
            decoded,
            Some(CacheEntry::Body {
                kind: "dblock".to_string(),
                record: block.clone()
            })
        );

        let decoded: CacheEntry<Block> = decode_entry("dblock", "k", &pointer).unwrap().unwrap();
        assert!(decoded.is_pointer());
        assert_eq!(
            decoded,
            CacheEntry::Pointer {
                kind: "dblock".to_string(),
                primary_key: block.hash
            }
        );
    }

    #[test]
    fn test_entries_of_another_kind_are_skipped() {
        let block = Block {
            hash: "d".repeat(64),
            height: 3,
        };
        let body = encode_body("dblock", &block).unwrap();
        let pointer = encode_pointer("dblock", &block.hash).unwrap();

        // `Other` cannot decode a `Block`, but the kind check runs first
        assert_eq!(decode_entry::<Other>("ablock", "k", &body).unwrap(), None);
        assert_eq!(decode_entry::<Other>("ablock", "k", &pointer).unwrap(), None);
    }

    #[test]
    fn test_body_of_own_kind_that_does_not_decode_is_corruption() {
        let body = encode_body("ablock", &Other { lookup: "x".into() }).unwrap();
        let err = decode_entry::<Block>("ablock", "x", &body).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_bare_hash_string_is_corruption() {
        // Untagged pointer layout is rejected instead of sniffed
        let raw = "0".repeat(64);
        let err = decode_entry::<Block>("dblock", "dblock-5", &raw).unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("dblock-5"));
        assert!(err.to_string().contains("flush the cache"));
    }

    #[test]
    fn test_value_decode_errors_name_the_key() {
        let err = decode_value::<u64>("fct-balance:FA1", "{not json").unwrap_err();
        match err {
            CacheError::Corrupted { key, .. } => assert_eq!(key, "fct-balance:FA1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
