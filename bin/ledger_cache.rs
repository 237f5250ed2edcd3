//! # Ledger Cache CLI
//!
//! Fetches ledger records and balances through the configured cache, reading
//! through to the node on a miss.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin ledger_cache -- record dblock 1000
//! cargo run --bin ledger_cache -- record dblock head
//! cargo run --bin ledger_cache -- balance FA2jK2HcLnRdS94dEcU27rF3meoJfpUcZPSinpb7AwQvPRY6RL1Q
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ledger_cache_sdk::{
    blocks::{AdminBlock, DirectoryBlock, EntryCreditBlock, FactoidBlock},
    node::NodeClient,
    values::{EntryCreditBalance, FactoidBalance, Receipt},
    LedgerCache, RecordKey, Settings,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ledger_cache", about = "Read-through cache for ledger node records")]
struct Cli {
    /// Settings file (defaults to ./Config.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a block by hash, height or `head`
    Record {
        kind: Kind,
        key: String,
    },
    /// Fetch balances for one or more addresses
    Balance {
        /// Entry credit balances instead of factoid balances
        #[arg(long)]
        ec: bool,
        /// Concurrent node requests (defaults to batch.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Fetch the inclusion receipt of an entry
    Receipt { entry_hash: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Dblock,
    Ablock,
    Ecblock,
    Fblock,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(settings: &Settings) {
    #[cfg(feature = "observability")]
    {
        use std::str::FromStr;
        let level = tracing::Level::from_str(&settings.log.level).unwrap_or(tracing::Level::INFO);
        tracing_subscriber::fmt().json().with_max_level(level).init();
    }

    #[cfg(not(feature = "observability"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log.level))
            .init();
    }
}

#[cfg(feature = "observability")]
fn init_metrics() -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .context("Failed to install Prometheus exporter")?;
    ledger_cache_sdk::metrics::describe_metrics();
    Ok(())
}

#[cfg(not(feature = "observability"))]
fn init_metrics() -> Result<()> {
    Ok(())
}

async fn fetch_record(cache: &LedgerCache<NodeClient>, kind: Kind, key: RecordKey) -> Result<()> {
    let not_found = || println!("null");
    match kind {
        Kind::Dblock => match cache.fetch_record::<DirectoryBlock>(key).await? {
            Some(block) => print_json(&block)?,
            None => not_found(),
        },
        Kind::Ablock => match cache.fetch_record::<AdminBlock>(key).await? {
            Some(block) => print_json(&block)?,
            None => not_found(),
        },
        Kind::Ecblock => match cache.fetch_record::<EntryCreditBlock>(key).await? {
            Some(block) => print_json(&block)?,
            None => not_found(),
        },
        Kind::Fblock => match cache.fetch_record::<FactoidBlock>(key).await? {
            Some(block) => print_json(&block)?,
            None => not_found(),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path),
        None => Settings::new(),
    }
    .context("Failed to load settings")?;

    init_logging(&settings);
    init_metrics()?;

    let cache = LedgerCache::from_settings(&settings).await?;

    match cli.command {
        Command::Record { kind, key } => {
            fetch_record(&cache, kind, RecordKey::parse(&key)).await?;
        }
        Command::Balance {
            ec,
            concurrency,
            addresses,
        } => {
            let balances: Vec<(String, Option<u64>)> = if ec {
                let values = cache
                    .fetch_simple_many::<EntryCreditBalance, _>(addresses.as_slice(), concurrency)
                    .await?;
                addresses
                    .iter()
                    .cloned()
                    .zip(values.into_iter().map(|v| v.map(|b| b.0)))
                    .collect()
            } else {
                let values = cache
                    .fetch_simple_many::<FactoidBalance, _>(addresses.as_slice(), concurrency)
                    .await?;
                addresses
                    .iter()
                    .cloned()
                    .zip(values.into_iter().map(|v| v.map(|b| b.0)))
                    .collect()
            };
            print_json(&balances)?;
        }
        Command::Receipt { entry_hash } => {
            let receipt = cache.fetch_simple::<Receipt>(&entry_hash).await?;
            print_json(&receipt)?;
        }
    }

    Ok(())
}
