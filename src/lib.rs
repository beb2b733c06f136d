//! Sidecache - a client-side Redis cache
//!
//! Keeps a bounded local mirror of recently read keys coherent with the
//! server through Redis 6 client tracking: invalidation messages are
//! redirected to a dedicated subscription and a background task evicts
//! the named keys as they arrive.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod remote;
pub mod session;

pub use cache::{BoundedCache, CacheStats, StatsSnapshot};
pub use client::CachedClient;
pub use config::Config;
pub use error::{CacheError, Result};
pub use listener::{spawn_invalidation_listener, ListenerContext};
pub use remote::RemoteStore;
pub use session::{register, Session, SessionHealth, SessionState};
