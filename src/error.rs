//! Error types for the caching client
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching client.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Server-side tracking could not be enabled at startup.
    ///
    /// Startup-fatal: serving from a local mirror without invalidation
    /// delivery would silently return stale data.
    #[error("Registration failed: {0}")]
    Registration(String),

    /// A cache miss hit the remote store and the fetch failed.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(#[from] redis::RedisError),

    /// A cache miss hit the remote store and the fetch timed out.
    #[error("Remote fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    /// The dedicated invalidation connection dropped.
    #[error("Invalidation connection lost: {0}")]
    ListenerLost(String),
}

// == Result Type Alias ==
/// Convenience Result type for the caching client.
pub type Result<T> = std::result::Result<T, CacheError>;
