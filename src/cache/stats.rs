//! Cache Statistics Module
//!
//! Tracks cache performance metrics: hits, misses, invalidations,
//! evictions, request count and cumulative latency.
//!
//! Counters are lock-free atomics so the accessor, the invalidation
//! listener and the reporter never contend on the cache lock just to
//! bump a number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

// == Cache Stats ==
/// Monotonic cache performance counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Reads served from the local mirror
    hits: AtomicU64,
    /// Reads that went to the remote store
    misses: AtomicU64,
    /// Keys removed by server invalidation messages
    invalidations: AtomicU64,
    /// Entries evicted to respect the capacity bound
    evictions: AtomicU64,
    /// Total read requests
    requests: AtomicU64,
    /// Cumulative wall-clock time of all read requests, in microseconds
    total_time_us: AtomicU64,
}

// == Stats Snapshot ==
/// Point-in-time view of the counters for the display collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub requests: u64,
    /// Average request latency in microseconds
    pub avg_latency_us: f64,
    /// hits / (hits + misses), 0.0 before any request
    pub hit_rate: f64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Invalidations ==
    /// Adds the number of keys actually removed by an invalidation
    /// message (one message may carry several keys).
    pub fn record_invalidations(&self, removed: u64) {
        self.invalidations.fetch_add(removed, Ordering::Relaxed);
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Request ==
    /// Counts one completed read request and its wall-clock latency.
    pub fn record_request(&self, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let requests = self.requests.load(Ordering::Relaxed);
        let total_time_us = self.total_time_us.load(Ordering::Relaxed);

        let avg_latency_us = if requests == 0 {
            0.0
        } else {
            total_time_us as f64 / requests as f64
        };
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        StatsSnapshot {
            hits,
            misses,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            requests,
            avg_latency_us,
            hit_rate,
        }
    }
}
