//! Shared fixtures: a scripted record origin, a counting value origin and a
//! store that fails on demand.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ledger_cache_sdk::{
    CacheStore, CacheableRecord, LedgerRecord, Lookup, MemoryStore, RecordKey, RecordOrigin,
    SetOptions, ValueOrigin,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub hash: String,
    pub height: u64,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub payload: String,
}

impl TestRecord {
    pub fn new(hash: &str, height: u64) -> Self {
        Self {
            hash: hash.to_string(),
            height,
            secondary: Vec::new(),
            payload: format!("body of {}", hash),
        }
    }

    pub fn with_secondary(mut self, key: &str) -> Self {
        self.secondary.push(key.to_string());
        self
    }
}

impl CacheableRecord for TestRecord {
    fn primary_key(&self) -> &str {
        &self.hash
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn secondary_keys(&self) -> Vec<&str> {
        self.secondary.iter().map(String::as_str).collect()
    }
}

impl LedgerRecord for TestRecord {
    const KIND: &'static str = "test";
}

/// Origin backed by a fixed list of records; counts every call.
pub struct ScriptedOrigin {
    records: Vec<TestRecord>,
    calls: AtomicUsize,
    fail: AtomicBool,
    seen: Mutex<Vec<RecordKey>>,
}

impl ScriptedOrigin {
    pub fn new(records: Vec<TestRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn seen(&self) -> Vec<RecordKey> {
        self.seen.lock().unwrap().clone()
    }

    fn find(&self, key: &RecordKey) -> Option<TestRecord> {
        match key {
            RecordKey::Hash(hash) => self
                .records
                .iter()
                .find(|r| &r.hash == hash || r.secondary.contains(hash))
                .cloned(),
            RecordKey::Height(height) => self.records.iter().find(|r| r.height == *height).cloned(),
            RecordKey::Head => self.records.iter().max_by_key(|r| r.height).cloned(),
        }
    }
}

#[async_trait]
impl RecordOrigin<TestRecord> for ScriptedOrigin {
    async fn fetch_record(&self, key: &RecordKey) -> Result<Lookup<TestRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(key.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("node unavailable"));
        }
        // Yield so concurrent callers interleave like real I/O
        tokio::task::yield_now().await;
        Ok(self.find(key).into())
    }
}

/// Value origin returning `key * 10` for numeric keys, `None` otherwise.
/// Tracks the peak number of concurrent calls.
pub struct CountingValueOrigin {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl CountingValueOrigin {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValueOrigin<u64> for CountingValueOrigin {
    async fn fetch_value(&self, key: &str) -> Result<Option<u64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // Later keys finish first so completion order differs from input order
        let n = key.parse::<u64>().ok();
        let extra = n.map_or(0, |n| 50u64.saturating_sub(n));
        tokio::time::sleep(self.delay + Duration::from_millis(extra)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if key == "boom" {
            return Err(anyhow!("origin exploded"));
        }
        Ok(n.map(|n| n * 10))
    }
}

/// Memory store that can be told to fail reads, all writes, or writes to
/// specific keys.
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
    fail_set_keys: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::unbounded(),
            fail_gets: AtomicBool::new(false),
            fail_sets: AtomicBool::new(false),
            fail_set_keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_for(&self, key: &str) {
        self.fail_set_keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, options: SetOptions) -> Result<()> {
        let blocked = self.fail_set_keys.lock().unwrap().contains(key);
        if blocked || self.fail_sets.load(Ordering::SeqCst) {
            return Err(anyhow!("write refused for {}", key));
        }
        self.inner.set(key, value, options).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    fn backend(&self) -> &'static str {
        "flaky"
    }
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::unbounded())
}
