//! Cache Module
//!
//! The bounded local mirror: insertion-ordered storage with FIFO
//! eviction, plus the performance counters shared across tasks.

mod order;
mod stats;
mod store;


// Re-export public types
pub use order::InsertOrder;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::BoundedCache;
