//! Single-key values served through the simple cache.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A value cached under `"{NAMESPACE}:{key}"`.
pub trait SimpleValue: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAMESPACE: &'static str;

    /// Values that change over time (balances) are written with the
    /// configured balance TTL; immutable ones use the default entry options.
    const EXPIRES: bool;

    fn cache_key(key: &str) -> String {
        format!("{}:{}", Self::NAMESPACE, key)
    }
}

/// Factoid balance of an address, in factoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactoidBalance(pub u64);

impl SimpleValue for FactoidBalance {
    const NAMESPACE: &'static str = "fct-balance";
    const EXPIRES: bool = true;
}

/// Entry credit balance of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryCreditBalance(pub u64);

impl SimpleValue for EntryCreditBalance {
    const NAMESPACE: &'static str = "ec-balance";
    const EXPIRES: bool = true;
}

/// Inclusion receipt for an entry. Immutable once the entry is anchored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(alias = "entryhash")]
    pub entry_hash: String,
    #[serde(flatten)]
    pub proof: Map<String, Value>,
}

impl SimpleValue for Receipt {
    const NAMESPACE: &'static str = "receipt";
    const EXPIRES: bool = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys_are_namespaced() {
        assert_eq!(FactoidBalance::cache_key("FA1"), "fct-balance:FA1");
        assert_eq!(EntryCreditBalance::cache_key("EC1"), "ec-balance:EC1");
        assert_ne!(FactoidBalance::cache_key("X"), Receipt::cache_key("X"));
    }

    #[test]
    fn test_balance_serializes_as_number() {
        assert_eq!(serde_json::to_string(&FactoidBalance(5)).unwrap(), "5");
        let b: EntryCreditBalance = serde_json::from_str("12").unwrap();
        assert_eq!(b, EntryCreditBalance(12));
    }
}
