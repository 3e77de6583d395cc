//! Cache Statistics Module
//!
//! Tracks per-backend counters: hits, misses, writes and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::eviction::EvictionSummary;

// == Cache Stats ==
/// Point-in-time snapshot of a backend's counters.
///
/// Both `has` and `get` count toward `hits` and `misses` on every backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found, expired or corrupt)
    pub misses: u64,
    /// Number of Set calls that reached the store
    pub writes: u64,
    /// Number of keys removed by Forget, EmptyByMatch, Empty or purges
    pub removals: u64,
    /// Number of batched delete transactions issued by prefix eviction
    pub eviction_batches: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Counters shared by every caller of one backend instance.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    removals: AtomicU64,
    eviction_batches: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removals(&self, count: u64) {
        self.removals.fetch_add(count, Ordering::Relaxed);
    }

    /// Folds a finished eviction run into the counters.
    pub fn record_eviction(&self, summary: EvictionSummary) {
        self.removals
            .fetch_add(summary.keys_removed, Ordering::Relaxed);
        self.eviction_batches
            .fetch_add(summary.batches, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            eviction_batches: self.eviction_batches.load(Ordering::Relaxed),
        }
    }
}
