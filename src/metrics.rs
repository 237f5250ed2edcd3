// src/metrics.rs

#[cfg(feature = "observability")]
pub use ::metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

// Macros for metrics when observability is disabled
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_histogram, histogram};

/// Initializes the descriptions for all the metrics in the crate.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "ledger_cache_hits_total",
        Unit::Count,
        "Cache hits, labeled by cache (record kind or value namespace) and number of reads."
    );
    describe_counter!(
        "ledger_cache_misses_total",
        Unit::Count,
        "Cache misses that fell through to the origin, labeled by cache."
    );
    describe_counter!(
        "ledger_cache_dangling_pointers_total",
        Unit::Count,
        "Pointer entries whose body entry was missing, labeled by cache."
    );
    describe_counter!(
        "ledger_origin_fetches_total",
        Unit::Count,
        "Origin calls issued on cache misses and head requests, labeled by cache."
    );
    describe_counter!(
        "ledger_origin_not_found_total",
        Unit::Count,
        "Origin calls that resolved to not-found, labeled by cache."
    );
    describe_counter!(
        "ledger_cache_store_errors_total",
        Unit::Count,
        "Store failures that were degraded or swallowed, labeled by backend and operation."
    );
    describe_histogram!(
        "ledger_origin_latency_seconds",
        Unit::Seconds,
        "Origin call latency in seconds, labeled by cache."
    );
    describe_histogram!(
        "ledger_store_operation_duration_seconds",
        Unit::Seconds,
        "Cache store operation latency in seconds, labeled by backend and operation."
    );
}

pub fn increment_cache_hit(cache_name: &str, reads: u64) {
    counter!("ledger_cache_hits_total", 1, "cache" => cache_name.to_string(), "reads" => reads.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("ledger_cache_misses_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_dangling_pointer(cache_name: &str) {
    counter!("ledger_cache_dangling_pointers_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_origin_fetch(cache_name: &str) {
    counter!("ledger_origin_fetches_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_not_found(cache_name: &str) {
    counter!("ledger_origin_not_found_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_store_error(backend: &str, operation: &str) {
    counter!("ledger_cache_store_errors_total", 1, "backend" => backend.to_string(), "operation" => operation.to_string());
}

pub fn record_origin_latency(cache_name: &str, duration: std::time::Duration) {
    histogram!("ledger_origin_latency_seconds", duration.as_secs_f64(), "cache" => cache_name.to_string());
}

pub fn record_store_operation_duration(backend: &str, operation: &str, duration: std::time::Duration) {
    histogram!("ledger_store_operation_duration_seconds", duration.as_secs_f64(), "backend" => backend.to_string(), "operation" => operation.to_string());
}
