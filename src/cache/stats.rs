//! Cache Statistics Module
//!
//! Tracks lookup calls and hits per cache kind, and the derived report
//! served to operators.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Counters ==
/// Lock-free call/hit counters, updated from concurrent lookups.
#[derive(Debug, Default)]
pub struct CacheCounters {
    total_calls: AtomicU64,
    hits: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one lookup and whether it hit.
    pub fn record(&self, hit: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Overwrites the counters (used when reloading the stats file).
    pub fn restore(&self, total_calls: u64, hits: u64) {
        self.total_calls.store(total_calls, Ordering::Relaxed);
        self.hits.store(hits.min(total_calls), Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.restore(0, 0);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

// == Cache Stats ==
/// Call and hit totals of one cache kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of lookups
    pub total_calls: u64,
    /// Number of lookups answered from the cache
    pub hits: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / total_calls, or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_calls as f64
        }
    }
}

// == Stat Report ==
/// Operator-facing statistics of one cache kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatReport {
    pub total_calls: u64,
    pub hits: u64,
    pub hit_rate: f64,
    /// Slots ever written / capacity
    pub fill_rate: f64,
    /// Slot array plus variable-length data of occupied slots
    pub memory_usage_bytes: usize,
    pub count: usize,
    pub capacity: usize,
}
