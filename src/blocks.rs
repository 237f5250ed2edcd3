//! Ledger block kinds served through the record cache.
//!
//! Only the fields used for addressing are typed; everything else the node
//! returns is kept verbatim in `extra`, so the cache never validates contents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{CacheableRecord, LedgerRecord};

/// Directory block: the per-height index of every other block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryBlock {
    #[serde(alias = "keyMR")]
    pub keymr: String,
    #[serde(alias = "dbheight")]
    pub height: u64,
    #[serde(alias = "fullhash", alias = "dbhash")]
    pub full_hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CacheableRecord for DirectoryBlock {
    fn primary_key(&self) -> &str {
        &self.keymr
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn secondary_keys(&self) -> Vec<&str> {
        vec![self.full_hash.as_str()]
    }
}

impl LedgerRecord for DirectoryBlock {
    const KIND: &'static str = "dblock";
}

/// Admin block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminBlock {
    #[serde(alias = "lookuphash")]
    pub lookup_hash: String,
    #[serde(alias = "dbheight")]
    pub height: u64,
    #[serde(alias = "backreferencehash")]
    pub backreference_hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CacheableRecord for AdminBlock {
    fn primary_key(&self) -> &str {
        &self.lookup_hash
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn secondary_keys(&self) -> Vec<&str> {
        vec![self.backreference_hash.as_str()]
    }
}

impl LedgerRecord for AdminBlock {
    const KIND: &'static str = "ablock";
}

/// Entry credit block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryCreditBlock {
    #[serde(alias = "headerhash")]
    pub header_hash: String,
    #[serde(alias = "dbheight")]
    pub height: u64,
    #[serde(alias = "fullhash")]
    pub full_hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CacheableRecord for EntryCreditBlock {
    fn primary_key(&self) -> &str {
        &self.header_hash
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn secondary_keys(&self) -> Vec<&str> {
        vec![self.full_hash.as_str()]
    }
}

impl LedgerRecord for EntryCreditBlock {
    const KIND: &'static str = "ecblock";
}

/// Factoid block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoidBlock {
    pub keymr: String,
    #[serde(alias = "dbheight")]
    pub height: u64,
    #[serde(alias = "ledgerkeymr")]
    pub ledger_keymr: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CacheableRecord for FactoidBlock {
    fn primary_key(&self) -> &str {
        &self.keymr
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn secondary_keys(&self) -> Vec<&str> {
        vec![self.ledger_keymr.as_str()]
    }
}

impl LedgerRecord for FactoidBlock {
    const KIND: &'static str = "fblock";
}
