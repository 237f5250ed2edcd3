//! JSON-RPC origin for the ledger node API.
//!
//! The node is slow and rate-limited, so every request waits on a shared
//! `governor` limiter. Nothing here retries: failures go straight back to the
//! caches, which propagate them to the caller.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::blocks::{AdminBlock, DirectoryBlock, EntryCreditBlock, FactoidBlock};
use crate::origin::{Lookup, RecordOrigin, ValueOrigin};
use crate::record::{LedgerRecord, RecordKey};
use crate::settings;
use crate::values::{EntryCreditBalance, FactoidBalance, Receipt};

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// JSON-RPC error codes the node uses for keys that do not resolve (yet).
pub const NOT_FOUND_CODES: [i64; 2] = [
    -32008, // object not found
    -32009, // missing chain head
];

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Turn a JSON-RPC response into `Some(result)`, `None` (not found) or an error.
pub fn classify_response(method: &str, response: RpcResponse) -> Result<Option<Value>> {
    if let Some(error) = response.error {
        if NOT_FOUND_CODES.contains(&error.code) {
            return Ok(None);
        }
        return Err(anyhow!(
            "{} failed with code {}: {}",
            method,
            error.code,
            error.message
        ));
    }

    match response.result {
        Some(Value::Null) | None => Err(anyhow!("{} returned neither result nor error", method)),
        Some(result) => Ok(Some(result)),
    }
}

/// Node methods for one record kind.
///
/// Every block kind exists once per directory block height, so the head of
/// any kind is the block at the node's current directory block height.
#[derive(Debug, Clone, Copy)]
pub struct RpcMethods {
    /// Lookup by key merkle root (`{"keymr": ..}`).
    pub by_hash: &'static str,
    /// Lookup by directory block height (`{"height": ..}`).
    pub by_height: &'static str,
    /// Field wrapping the record in both results.
    pub result_field: &'static str,
    /// JSON pointer to the height in a by-hash result that does not carry the
    /// full record. The record is then fetched by that height.
    pub hash_result_height: Option<&'static str>,
}

impl RpcMethods {
    pub fn by_hash_request(&self, hash: &str) -> (&'static str, Value) {
        (self.by_hash, json!({ "keymr": hash }))
    }

    pub fn by_height_request(&self, height: u64) -> (&'static str, Value) {
        (self.by_height, json!({ "height": height }))
    }

    /// Unwrap the record from a result and lift `header.dbheight` to the top
    /// level for kinds that only carry it in their header.
    pub fn decode<R: DeserializeOwned>(&self, mut result: Value) -> Result<R> {
        let mut record = match result.get_mut(self.result_field) {
            Some(inner) => inner.take(),
            None => return Err(anyhow!("node result has no `{}` field", self.result_field)),
        };

        let header_height = record.pointer("/header/dbheight").cloned();
        if let (Some(object), Some(height)) = (record.as_object_mut(), header_height) {
            if !object.contains_key("dbheight") && !object.contains_key("height") {
                object.insert("dbheight".to_string(), height);
            }
        }

        serde_json::from_value(record).context("node returned a record in an unexpected shape")
    }

    /// Height carried by a by-hash result, for kinds whose by-hash result is
    /// only a summary.
    pub fn height_from_hash_result(&self, result: &Value) -> Result<Option<u64>> {
        let Some(pointer) = self.hash_result_height else {
            return Ok(None);
        };
        result
            .pointer(pointer)
            .and_then(Value::as_u64)
            .map(Some)
            .ok_or_else(|| anyhow!("{} result has no height at {}", self.by_hash, pointer))
    }
}

/// A record kind the node can serve.
pub trait NodeRecord: LedgerRecord {
    const METHODS: RpcMethods;
}

impl NodeRecord for DirectoryBlock {
    const METHODS: RpcMethods = RpcMethods {
        by_hash: "directory-block",
        by_height: "dblock-by-height",
        result_field: "dblock",
        // `directory-block` answers with a header and an entry list only
        hash_result_height: Some("/header/sequencenumber"),
    };
}

impl NodeRecord for AdminBlock {
    const METHODS: RpcMethods = RpcMethods {
        by_hash: "admin-block",
        by_height: "ablock-by-height",
        result_field: "ablock",
        hash_result_height: None,
    };
}

impl NodeRecord for EntryCreditBlock {
    const METHODS: RpcMethods = RpcMethods {
        by_hash: "entrycredit-block",
        by_height: "ecblock-by-height",
        result_field: "ecblock",
        hash_result_height: None,
    };
}

impl NodeRecord for FactoidBlock {
    const METHODS: RpcMethods = RpcMethods {
        by_hash: "factoid-block",
        by_height: "fblock-by-height",
        result_field: "fblock",
        hash_result_height: None,
    };
}

/// A single-key value the node can serve.
pub trait NodeValue: Sized {
    const METHOD: &'static str;

    fn params(key: &str) -> Value;

    fn from_result(result: Value) -> Result<Self>;
}

#[derive(Deserialize)]
struct BalanceResult {
    balance: u64,
}

impl NodeValue for FactoidBalance {
    const METHOD: &'static str = "factoid-balance";

    fn params(key: &str) -> Value {
        json!({ "address": key })
    }

    fn from_result(result: Value) -> Result<Self> {
        let parsed: BalanceResult =
            serde_json::from_value(result).context("unexpected factoid-balance result")?;
        Ok(FactoidBalance(parsed.balance))
    }
}

impl NodeValue for EntryCreditBalance {
    const METHOD: &'static str = "entry-credit-balance";

    fn params(key: &str) -> Value {
        json!({ "address": key })
    }

    fn from_result(result: Value) -> Result<Self> {
        let parsed: BalanceResult =
            serde_json::from_value(result).context("unexpected entry-credit-balance result")?;
        Ok(EntryCreditBalance(parsed.balance))
    }
}

impl NodeValue for Receipt {
    const METHOD: &'static str = "receipt";

    fn params(key: &str) -> Value {
        json!({ "hash": key })
    }

    fn from_result(mut result: Value) -> Result<Self> {
        if let Some(inner) = result.get_mut("receipt") {
            result = inner.take();
        }
        // The node nests the hash as `entry.entryhash`
        let nested_hash = result.pointer("/entry/entryhash").cloned();
        if let (Some(object), Some(hash)) = (result.as_object_mut(), nested_hash) {
            if !object.contains_key("entryhash") && !object.contains_key("entry_hash") {
                object.insert("entryhash".to_string(), hash);
            }
        }
        serde_json::from_value(result).context("unexpected receipt result")
    }
}

/// Rate-limited JSON-RPC client for the ledger node.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    url: Url,
    limiter: Arc<DefaultDirectRateLimiter>,
    next_id: Arc<AtomicU64>,
}

impl NodeClient {
    pub fn new(settings: &settings::Node) -> Result<Self> {
        let url = Url::parse(&settings.url)
            .with_context(|| format!("invalid node url {}", settings.url))?;
        let quota = Quota::per_second(
            NonZeroU32::new(settings.qps_limit).ok_or_else(|| anyhow!("QPS must be non-zero"))?,
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url,
            limiter: Arc::new(RateLimiter::direct(quota)),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Call `method`. `Ok(None)` means the node reported the object as not found.
    pub async fn call(&self, method: &str, params: Value) -> Result<Option<Value>> {
        self.limiter.until_ready().await;

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("NodeClient: {} {}", method, request.params);

        let response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{} request to {} failed", method, self.url))?;

        let status = response.status();
        let body: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("{} returned an invalid JSON-RPC body (HTTP {})", method, status))?;

        classify_response(method, body)
    }

    /// Height of the latest saved directory block. `None` before the node has
    /// saved any block.
    pub async fn head_height(&self) -> Result<Option<u64>> {
        let Some(result) = self.call("heights", json!({})).await? else {
            return Ok(None);
        };
        head_height_from(&result).map(Some)
    }
}

fn head_height_from(result: &Value) -> Result<u64> {
    result
        .get("directoryblockheight")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("heights result has no directoryblockheight"))
}

#[async_trait]
impl<R> RecordOrigin<R> for NodeClient
where
    R: NodeRecord + 'static,
{
    async fn fetch_record(&self, key: &RecordKey) -> Result<Lookup<R>> {
        let methods = R::METHODS;
        let height = match key {
            RecordKey::Height(height) => *height,
            RecordKey::Head => match self.head_height().await? {
                Some(height) => height,
                None => return Ok(Lookup::NotFound),
            },
            RecordKey::Hash(hash) => {
                let (method, params) = methods.by_hash_request(hash);
                let Some(result) = self.call(method, params).await? else {
                    return Ok(Lookup::NotFound);
                };
                match methods.height_from_hash_result(&result)? {
                    Some(height) => height,
                    None => return Ok(Lookup::Found(methods.decode(result)?)),
                }
            }
        };

        let (method, params) = methods.by_height_request(height);
        match self.call(method, params).await? {
            None => Ok(Lookup::NotFound),
            Some(result) => Ok(Lookup::Found(methods.decode(result)?)),
        }
    }
}

#[async_trait]
impl<V> ValueOrigin<V> for NodeClient
where
    V: NodeValue + Send + 'static,
{
    async fn fetch_value(&self, key: &str) -> Result<Option<V>> {
        match self.call(V::METHOD, V::params(key)).await? {
            None => Ok(None),
            Some(result) => Ok(Some(V::from_result(result)?)),
        }
    }
}
