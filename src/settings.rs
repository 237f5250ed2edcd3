use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use url::Url;

use crate::simple_cache::DEFAULT_BATCH_CONCURRENCY;

#[derive(Debug, Deserialize, Clone)]
pub struct Node {
    #[serde(default = "default_node_url")]
    pub url: String,
    #[serde(default = "default_node_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Requests per second allowed against the node (the public API is rate-limited)
    #[serde(default = "default_qps_limit")]
    pub qps_limit: u32,
}

fn default_node_url() -> String {
    "http://127.0.0.1:8088/v2".to_string()
}
fn default_node_timeout_seconds() -> u64 {
    10
}
fn default_qps_limit() -> u32 {
    20
}

impl Default for Node {
    fn default() -> Self {
        Self {
            url: default_node_url(),
            timeout_seconds: default_node_timeout_seconds(),
            qps_limit: default_qps_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::Memory
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// TTL for record entries and immutable values. Unset means the store's own policy.
    #[serde(default)]
    pub default_ttl_seconds: Option<u64>,
    /// TTL for balances, which change with every block.
    #[serde(default = "default_balance_ttl_seconds")]
    pub balance_ttl_seconds: u64,
}

fn default_memory_capacity() -> usize {
    100_000
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_balance_ttl_seconds() -> u64 {
    10
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            memory_capacity: default_memory_capacity(),
            redis_url: default_redis_url(),
            default_ttl_seconds: None,
            balance_ttl_seconds: default_balance_ttl_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Batch {
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            concurrency: default_batch_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String, // "debug", "info", "warn"
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub node: Node,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub batch: Batch,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    /// Load `Config.toml` from the working directory (optional) plus
    /// `LEDGER_CACHE__*` environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Path::new("Config.toml"))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("LEDGER_CACHE").separator("__"))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Short aliases used by deployment scripts
        if let Ok(node_url) = env::var("LEDGER_NODE_URL") {
            let trimmed = node_url.trim();
            if !trimmed.is_empty() {
                settings.node.url = trimmed.to_string();
            }
        }
        if let Ok(redis_url) = env::var("REDIS_URL") {
            let trimmed = redis_url.trim();
            if !trimmed.is_empty() {
                settings.cache.redis_url = trimmed.to_string();
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.concurrency == 0 {
            return Err(ConfigError::Message(
                "batch.concurrency must be greater than zero".to_string(),
            ));
        }
        if self.cache.memory_capacity == 0 {
            return Err(ConfigError::Message(
                "cache.memory_capacity must be greater than zero".to_string(),
            ));
        }
        if self.node.qps_limit == 0 {
            return Err(ConfigError::Message(
                "node.qps_limit must be greater than zero".to_string(),
            ));
        }
        Url::parse(&self.node.url).map_err(|e| {
            ConfigError::Message(format!("node.url '{}' is invalid: {}", self.node.url, e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.batch.concurrency, 5);
        assert_eq!(settings.cache.backend, CacheBackend::Memory);
        assert_eq!(settings.cache.default_ttl_seconds, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[node]
url = "https://api.example.org/v2"
qps_limit = 3

[cache]
backend = "redis"
default_ttl_seconds = 3600

[batch]
concurrency = 8
"#,
        );
        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.node.qps_limit, 3);
        assert_eq!(settings.node.timeout_seconds, 10);
        assert_eq!(settings.cache.backend, CacheBackend::Redis);
        assert_eq!(settings.cache.default_ttl_seconds, Some(3600));
        assert_eq!(settings.batch.concurrency, 8);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let file = write_config("[batch]\nconcurrency = 0\n");
        assert!(Settings::load(file.path()).is_err());
    }

    #[test]
    fn test_rejects_bad_node_url() {
        let mut settings = Settings::default();
        settings.node.url = "not a url".to_string();
        assert!(settings.validate().is_err());
    }
}
