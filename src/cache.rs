// Discovery cache and run metrics
// Entries live for a fixed TTL; expired entries read as misses and are
// replaced on the next insert, so stats count every key inserted since the
// last clear.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::RequestRecord;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// String-keyed cache with a single time-to-live for every entry.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            _ => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub request_entries: usize,
    pub collection_entries: usize,
    pub total_entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Request,
    Collection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub total_runs: u64,
    pub request_runs: u64,
    pub collection_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub average_duration_ms: f64,
    #[serde(skip)]
    total_duration_ms: u64,
}

/// Owns the discovery caches and the run counters.
pub struct PerformanceManager {
    enabled: bool,
    ttl: Duration,
    requests: TtlCache<Vec<RequestRecord>>,
    collections: TtlCache<Vec<PathBuf>>,
    metrics: Mutex<RunMetrics>,
}

impl PerformanceManager {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            requests: TtlCache::new(ttl),
            collections: TtlCache::new(ttl),
            metrics: Mutex::new(RunMetrics::default()),
        }
    }

    pub fn cached_requests(&self, key: &str) -> Option<Vec<RequestRecord>> {
        if !self.enabled {
            return None;
        }
        self.requests.get(key)
    }

    pub fn cache_requests(&self, key: &str, records: &[RequestRecord]) {
        if self.enabled {
            self.requests.insert(key, records.to_vec());
        }
    }

    pub fn cached_collections(&self, key: &str) -> Option<Vec<PathBuf>> {
        if !self.enabled {
            return None;
        }
        self.collections.get(key)
    }

    pub fn cache_collections(&self, key: &str, roots: &[PathBuf]) {
        if self.enabled {
            self.collections.insert(key, roots.to_vec());
        }
    }

    pub fn clear_cache(&self) {
        self.requests.clear();
        self.collections.clear();
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        let request_entries = self.requests.len();
        let collection_entries = self.collections.len();
        CacheStats {
            enabled: self.enabled,
            ttl_secs: self.ttl.as_secs(),
            request_entries,
            collection_entries,
            total_entries: request_entries + collection_entries,
        }
    }

    pub fn record_run(&self, kind: RunKind, duration: Duration, success: bool) {
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        metrics.total_runs += 1;
        match kind {
            RunKind::Request => metrics.request_runs += 1,
            RunKind::Collection => metrics.collection_runs += 1,
        }
        if success {
            metrics.successful_runs += 1;
        } else {
            metrics.failed_runs += 1;
        }
        metrics.total_duration_ms = metrics
            .total_duration_ms
            .saturating_add(duration.as_millis() as u64);
        metrics.average_duration_ms = metrics.total_duration_ms as f64 / metrics.total_runs as f64;
    }

    pub fn metrics(&self) -> RunMetrics {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub fn format_cache_stats(stats: &CacheStats) -> String {
    let mut out = String::from("Cache Statistics:\n");
    out.push_str(&format!(
        "  Enabled: {}\n",
        if stats.enabled { "yes" } else { "no" }
    ));
    out.push_str(&format!("  TTL: {}s\n", stats.ttl_secs));
    out.push_str(&format!("  Request list entries: {}\n", stats.request_entries));
    out.push_str(&format!(
        "  Collection discovery entries: {}\n",
        stats.collection_entries
    ));
    out.push_str(&format!("  Total entries: {}\n", stats.total_entries));
    out
}

pub fn format_metrics(metrics: &RunMetrics) -> String {
    let mut out = String::from("Run Metrics:\n");
    out.push_str(&format!("  Total runs: {}\n", metrics.total_runs));
    out.push_str(&format!(
        "  Requests / collections: {} / {}\n",
        metrics.request_runs, metrics.collection_runs
    ));
    out.push_str(&format!("  Successful: {}\n", metrics.successful_runs));
    out.push_str(&format!("  Failed: {}\n", metrics.failed_runs));
    out.push_str(&format!(
        "  Average duration: {:.0}ms\n",
        metrics.average_duration_ms
    ));
    out
}
