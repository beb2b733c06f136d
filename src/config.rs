//! Configuration Module
//!
//! Handles loading and managing client configuration from environment variables.

use std::env;

/// Caching client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis server URL for the data path
    pub redis_url: String,
    /// Maximum number of entries the local mirror can hold (None = unbounded)
    pub cache_capacity: Option<usize>,
    /// Number of distinct keys the workload driver seeds and touches
    pub keyspace_size: usize,
    /// Fraction of workload operations that are reads, in [0, 1]
    pub read_ratio: f64,
    /// Timeout in milliseconds for a remote fetch on a cache miss
    pub fetch_timeout_ms: u64,
    /// Statistics reporting interval in seconds
    pub report_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Redis server URL (default: redis://127.0.0.1:6379)
    /// - `LOCAL_CACHE_CAPACITY` - Max mirror entries, 0 or unset = unbounded
    /// - `KEYSPACE_SIZE` - Workload keyspace size (default: 1000)
    /// - `READ_RATIO` - Read fraction of the workload (default: 1.0)
    /// - `FETCH_TIMEOUT_MS` - Remote fetch timeout in ms (default: 5000)
    /// - `REPORT_INTERVAL` - Stats reporting frequency in seconds (default: 5)
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            cache_capacity: env::var("LOCAL_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&c: &usize| c > 0),
            keyspace_size: env::var("KEYSPACE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            read_ratio: env::var("READ_RATIO")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(|r: f64| r.clamp(0.0, 1.0))
                .unwrap_or(1.0),
            fetch_timeout_ms: env::var("FETCH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            report_interval: env::var("REPORT_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    /// Returns the URL for the dedicated invalidation connection.
    ///
    /// Invalidations arrive as RESP3 push messages, so the dedicated
    /// connection must negotiate RESP3 even when the data path does not.
    pub fn dedicated_url(&self) -> String {
        if self.redis_url.contains('?') {
            format!("{}&protocol=resp3", self.redis_url)
        } else {
            format!("{}?protocol=resp3", self.redis_url)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            cache_capacity: None,
            keyspace_size: 1000,
            read_ratio: 1.0,
            fetch_timeout_ms: 5000,
            report_interval: 5,
        }
    }
}
