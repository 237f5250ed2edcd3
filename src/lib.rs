//! # Ledger Cache SDK
//!
//! A read-through caching layer between an application and a ledger node API.
//! The node is slow and rate-limited, and its records are immutable and
//! addressable by several keys: a content hash, a height, and sometimes a
//! secondary hash. This crate serves every record from cache whenever it can,
//! populates the cache on first fetch, and keeps all of a record's keys
//! pointing at a single stored body.
//!
//! ## Overview
//!
//! - **Record cache**: body under the primary key, pointers under the
//!   kind-namespaced height and under every secondary key. Any key resolves in
//!   at most two store reads.
//! - **Simple cache**: one key, one value, optional TTL, batched lookups with
//!   bounded concurrency.
//! - **No negative caching**: a key the node does not know is looked up again
//!   next time.
//!
//! ## Architecture
//!
//! ### Store Layer
//! [`store::CacheStore`] over opaque strings, with an in-memory LRU backend and
//! an optional Redis backend (`redis` feature).
//!
//! ### Cache Layer
//! [`record_cache::RecordCache`] and [`simple_cache::SimpleCache`], both
//! generic over the origin they read through to.
//!
//! ### Origin Layer
//! [`origin::RecordOrigin`] / [`origin::ValueOrigin`], implemented for the
//! node's JSON-RPC API by [`node::NodeClient`].
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use ledger_cache_sdk::{blocks::DirectoryBlock, LedgerCache, RecordKey, Settings};
//!
//! let settings = Settings::new()?;
//! let cache = LedgerCache::from_settings(&settings).await?;
//! let block: Option<DirectoryBlock> = cache.fetch_record(RecordKey::Height(1000)).await?;
//! # Ok(())
//! # }
//! ```

// Core
/// Record keys and the cacheable record traits
pub mod record;
/// Tagged cache entries and value serialization
pub mod codec;
/// Error types
pub mod error;

// Caches
/// Indirected record cache (hash, height and secondary keys)
pub mod record_cache;
/// Single-key read-through cache with batched lookups
pub mod simple_cache;
/// Caller-facing facade
pub mod ledger_cache;

// Store backends
/// Cache store trait and in-memory backend
pub mod store;
/// Redis cache store (optional, feature-gated)
#[cfg(feature = "redis")]
pub mod redis_store;

// Origin
/// Origin traits
pub mod origin;
/// Ledger node JSON-RPC client
pub mod node;

// Ledger types
/// Block kinds
pub mod blocks;
/// Balances and receipts
pub mod values;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use error::{CacheError, CacheResult};
pub use ledger_cache::LedgerCache;
pub use origin::{Lookup, RecordOrigin, ValueOrigin};
pub use record::{CacheableRecord, LedgerRecord, RecordKey};
pub use record_cache::RecordCache;
pub use settings::Settings;
pub use simple_cache::{SimpleCache, DEFAULT_BATCH_CONCURRENCY};
pub use store::{CacheStore, MemoryStore, SetOptions};
