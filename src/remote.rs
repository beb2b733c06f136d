//! Remote Store Module
//!
//! The data-path seam between the accessor and the backing Redis store.
//!
//! The accessor only ever needs one operation from the remote side: fetch
//! the current value of a key on a cache miss. Keeping that behind a trait
//! lets the coherence tests drive the accessor without a live server.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::error::Result;

// == Remote Store Trait ==
/// A backing key-value store the cache mirrors.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Fetches the current value for a key.
    ///
    /// Returns `Ok(None)` when the key does not exist remotely; absent
    /// values are never cached.
    async fn fetch(&mut self, key: &str) -> Result<Option<String>>;
}

// == Redis Implementation ==
impl RemoteStore for MultiplexedConnection {
    async fn fetch(&mut self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.get(key).await?;
        Ok(value)
    }
}
