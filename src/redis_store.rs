// Redis Store - shared cache backend for multi-process deployments
// Implements CacheStore on top of a redis ConnectionManager

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::store::{CacheStore, SetOptions};

/// Keys deleted per `DEL` during a flush.
const FLUSH_BATCH: usize = 500;

/// Redis-backed [`CacheStore`](crate::store::CacheStore).
///
/// Entries without a TTL are written with plain `SET`, so retention follows
/// the server's `maxmemory-policy`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    url: String,
}

impl RedisStore {
    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Redis cache store connected to {}", url);

        Ok(Self {
            conn,
            url: url.to_string(),
        })
    }

    /// Test Redis connection
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;

        if pong == "PONG" {
            Ok(())
        } else {
            anyhow::bail!("Unexpected Redis response: {}", pong)
        }
    }

    /// Delete every key starting with `prefix` (e.g. `"dblock-"` or
    /// `"fct-balance:"`). Returns the number of keys removed. Used by operators
    /// after a corruption report.
    ///
    /// Keys are listed with `SCAN` and deleted in batches, so the server keeps
    /// serving other clients during a flush.
    pub async fn flush_prefix(&self, prefix: &str) -> Result<usize> {
        let pattern = format!("{}*", escape_glob(prefix));

        let keys: Vec<String> = {
            let mut conn = self.conn.clone();
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .context("Failed to scan keys for flush")?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut conn = self.conn.clone();
        for chunk in keys.chunks(FLUSH_BATCH) {
            conn.del::<_, ()>(chunk)
                .await
                .context("Failed to flush keys")?;
        }

        if !keys.is_empty() {
            info!("Flushed {} keys with prefix {}", keys.len(), prefix);
        }
        Ok(keys.len())
    }
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let start = std::time::Instant::now();
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Failed to GET {} from {}", key, self.url))?;

        crate::metrics::record_store_operation_duration("redis", "get", start.elapsed());
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, options: SetOptions) -> Result<()> {
        let start = std::time::Instant::now();
        let mut conn = self.conn.clone();
        match options.ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .with_context(|| format!("Failed to SETEX {}", key))?,
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .with_context(|| format!("Failed to SET {}", key))?,
        }

        crate::metrics::record_store_operation_duration("redis", "set", start.elapsed());
        debug!("Cached {} in redis", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .with_context(|| format!("Failed to DEL {}", key))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
