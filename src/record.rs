//! Record addressing: the keys a record can be looked up by and the trait a
//! type implements to be cached with indirection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// How a caller addresses a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Primary or secondary key (a hash).
    Hash(String),
    /// Sequential height within one record kind.
    Height(u64),
    /// Current head of the kind. Never served from cache.
    Head,
}

impl RecordKey {
    /// Parse user input: digits are a height, `head` (any case) or an empty
    /// string is the head, anything else is a hash.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("head") {
            RecordKey::Head
        } else if let Ok(height) = trimmed.parse::<u64>() {
            RecordKey::Height(height)
        } else {
            RecordKey::Hash(trimmed.to_string())
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self, RecordKey::Head)
    }
}

impl From<&str> for RecordKey {
    fn from(hash: &str) -> Self {
        RecordKey::Hash(hash.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(hash: String) -> Self {
        RecordKey::Hash(hash)
    }
}

impl From<u64> for RecordKey {
    fn from(height: u64) -> Self {
        RecordKey::Height(height)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Hash(hash) => write!(f, "{}", hash),
            RecordKey::Height(height) => write!(f, "#{}", height),
            RecordKey::Head => write!(f, "head"),
        }
    }
}

/// Cache slot for a height pointer. Heights only repeat across kinds, so the
/// kind is part of the key.
pub fn height_key(kind: &str, height: u64) -> String {
    format!("{}-{}", kind, height)
}

/// A record that can be cached under a primary key, a height pointer and any
/// number of secondary pointers.
pub trait CacheableRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Canonical key; the body entry lives here.
    fn primary_key(&self) -> &str;

    fn height(&self) -> u64;

    /// Other keys that identify exactly this record.
    fn secondary_keys(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// A record type with a fixed kind name, used to namespace height keys.
pub trait LedgerRecord: CacheableRecord {
    const KIND: &'static str;
}
