//! Cache-Aside Accessor Module
//!
//! The public read path: consult the local mirror first, fall back to
//! the remote store on a miss and populate the mirror with the result.
//!
//! A hit never touches the remote store. The cache lock is never held
//! across the remote round trip; after an unlocked fetch the insert
//! re-checks for a racing caller and keeps the first value
//! (skip-if-present).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::cache::{BoundedCache, CacheStats, StatsSnapshot};
use crate::error::{CacheError, Result};
use crate::remote::RemoteStore;
use crate::session::SessionHealth;

// == Cached Client ==
/// Cache-aside accessor over a remote store and the shared local mirror.
pub struct CachedClient<R: RemoteStore> {
    /// Data-path connection to the backing store
    remote: R,
    /// The local mirror, shared with the invalidation listener
    cache: Arc<RwLock<BoundedCache>>,
    /// Shared performance counters
    stats: Arc<CacheStats>,
    /// Session state; the mirror is only consulted while registered
    health: SessionHealth,
    /// Timeout applied to each remote fetch
    fetch_timeout: Duration,
}

impl<R: RemoteStore> CachedClient<R> {
    // == Constructor ==
    pub fn new(
        remote: R,
        cache: Arc<RwLock<BoundedCache>>,
        stats: Arc<CacheStats>,
        health: SessionHealth,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            cache,
            stats,
            health,
            fetch_timeout,
        }
    }

    // == Get ==
    /// Reads a key, serving from the local mirror when possible.
    ///
    /// Returns `Ok(None)` when the key does not exist remotely. Fetch
    /// failures and timeouts propagate unretried; retry policy belongs
    /// to the caller.
    ///
    /// Latency and the request counter cover the whole call, hit or miss.
    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let start = Instant::now();
        let result = self.lookup(key).await;
        self.stats.record_request(start.elapsed());
        result
    }

    async fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        // While the session is not registered the mirror is unmonitored
        // and must be bypassed entirely: no reads, no inserts.
        let trusted = self.health.is_registered();
        let epoch = self.health.epoch();

        if trusted {
            if let Some(value) = self.cache.read().await.get(key) {
                self.stats.record_hit();
                return Ok(Some(value));
            }
        }

        // Going remote either way, so this is a miss even if the fetch
        // fails: hits + misses must cover every request.
        self.stats.record_miss();

        // Fetch with the lock released so other readers keep moving.
        let fetched = tokio::time::timeout(self.fetch_timeout, self.remote.fetch(key))
            .await
            .map_err(|_| CacheError::FetchTimeout(self.fetch_timeout))??;

        if trusted {
            if let Some(value) = &fetched {
                let mut cache = self.cache.write().await;
                // Two races resolve here. A racing caller may have
                // populated the key during the unlocked window: keep the
                // first insert. And the session may have dropped and
                // re-registered mid-fetch: the value was read while no
                // server tracked it, so a changed epoch means it must
                // not be cached even though the state is `Registered`
                // again.
                if self.health.epoch() == epoch
                    && cache.get(key).is_none()
                    && cache.insert(key.to_string(), value.clone()).is_some()
                {
                    self.stats.record_eviction();
                }
            }
        }

        Ok(fetched)
    }

    // == Stats ==
    /// Returns a point-in-time snapshot of the counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // == Cache Handle ==
    /// Shared handle to the underlying mirror.
    pub fn cache(&self) -> Arc<RwLock<BoundedCache>> {
        Arc::clone(&self.cache)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// In-memory remote store that counts fetches.
    struct FakeRemote {
        values: HashMap<String, String>,
        fetches: Arc<AtomicU64>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl FakeRemote {
        fn with(values: &[(&str, &str)]) -> Self {
            Self {
                values: values
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                fetches: Arc::new(AtomicU64::new(0)),
                fail: false,
                delay: None,
            }
        }
    }

    impl RemoteStore for FakeRemote {
        async fn fetch(&mut self, key: &str) -> Result<Option<String>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CacheError::FetchTimeout(Duration::from_secs(0)));
            }
            Ok(self.values.get(key).cloned())
        }
    }

    fn registered_client(
        remote: FakeRemote,
        capacity: Option<usize>,
    ) -> CachedClient<FakeRemote> {
        let health = SessionHealth::new();
        health.set(SessionState::Registered);
        CachedClient::new(
            remote,
            Arc::new(RwLock::new(BoundedCache::new(capacity))),
            Arc::new(CacheStats::new()),
            health,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_miss_fetches_then_hit_serves_locally() {
        let remote = FakeRemote::with(&[("key1", "value1")]);
        let fetches = Arc::clone(&remote.fetches);
        let mut client = registered_client(remote, Some(10));

        // First read: miss, one remote fetch
        assert_eq!(
            client.get("key1").await.unwrap(),
            Some("value1".to_string())
        );
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Second read: hit, zero additional fetches
        assert_eq!(
            client.get("key1").await.unwrap(),
            Some("value1".to_string())
        );
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        let stats = client.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.requests, 2);
    }

    #[tokio::test]
    async fn test_hit_returns_inserted_value_without_remote_call() {
        let remote = FakeRemote::with(&[("key1", "remote-value")]);
        let fetches = Arc::clone(&remote.fetches);
        let mut client = registered_client(remote, Some(10));

        client
            .cache()
            .write()
            .await
            .insert("key1".to_string(), "cached-value".to_string());

        // The hit serves the cached generation, not the remote one
        assert_eq!(
            client.get("key1").await.unwrap(),
            Some("cached-value".to_string())
        );
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_absent_remote_key_is_not_cached() {
        let remote = FakeRemote::with(&[]);
        let fetches = Arc::clone(&remote.fetches);
        let mut client = registered_client(remote, Some(10));

        assert_eq!(client.get("ghost").await.unwrap(), None);
        assert_eq!(client.get("ghost").await.unwrap(), None);

        // No negative caching: both reads went remote
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert!(client.cache().read().await.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_session_bypasses_cache() {
        let remote = FakeRemote::with(&[("key1", "fresh")]);
        let fetches = Arc::clone(&remote.fetches);
        let health = SessionHealth::new();
        health.set(SessionState::Disconnected);
        let mut client = CachedClient::new(
            remote,
            Arc::new(RwLock::new(BoundedCache::new(Some(10)))),
            Arc::new(CacheStats::new()),
            health,
            Duration::from_secs(5),
        );

        // Pre-populated entry is stale by assumption once unmonitored
        client
            .cache()
            .write()
            .await
            .insert("key1".to_string(), "stale".to_string());

        assert_eq!(client.get("key1").await.unwrap(), Some("fresh".to_string()));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        // And nothing new is inserted while untrusted
        assert_eq!(
            client.cache().read().await.get("key1"),
            Some("stale".to_string())
        );
    }

    #[tokio::test]
    async fn test_eviction_at_capacity_is_counted() {
        let remote = FakeRemote::with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let mut client = registered_client(remote, Some(2));

        client.get("a").await.unwrap();
        client.get("b").await.unwrap();
        client.get("c").await.unwrap();

        let stats = client.stats();
        assert_eq!(stats.evictions, 1);

        let cache = client.cache();
        let guard = cache.read().await;
        assert_eq!(guard.len(), 2);
        // FIFO: a was the oldest insert
        assert_eq!(guard.get("a"), None);
        assert!(guard.get("b").is_some());
        assert!(guard.get("c").is_some());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_unretried() {
        let mut remote = FakeRemote::with(&[]);
        remote.fail = true;
        let fetches = Arc::clone(&remote.fetches);
        let mut client = registered_client(remote, Some(10));

        assert!(client.get("key1").await.is_err());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // The failed request still counts, as a miss: it went remote
        let stats = client.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.misses, stats.requests);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_maps_to_error() {
        let mut remote = FakeRemote::with(&[("key1", "value1")]);
        remote.delay = Some(Duration::from_secs(30));
        let health = SessionHealth::new();
        health.set(SessionState::Registered);
        let mut client = CachedClient::new(
            remote,
            Arc::new(RwLock::new(BoundedCache::new(Some(10)))),
            Arc::new(CacheStats::new()),
            health,
            Duration::from_secs(1),
        );

        let result = client.get("key1").await;
        assert!(matches!(result, Err(CacheError::FetchTimeout(_))));

        let stats = client.stats();
        assert_eq!(stats.hits + stats.misses, stats.requests);
    }

    /// Remote that parks mid-fetch until the test releases it.
    struct GatedRemote {
        value: String,
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    impl RemoteStore for GatedRemote {
        async fn fetch(&mut self, _key: &str) -> Result<Option<String>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Some(self.value.clone()))
        }
    }

    #[tokio::test]
    async fn test_fetch_spanning_reregistration_is_not_cached() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let remote = GatedRemote {
            value: "v1".to_string(),
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        };

        let health = SessionHealth::new();
        health.set(SessionState::Registered);
        let cache = Arc::new(RwLock::new(BoundedCache::new(Some(10))));
        let mut client = CachedClient::new(
            remote,
            Arc::clone(&cache),
            Arc::new(CacheStats::new()),
            health.clone(),
            Duration::from_secs(5),
        );

        let reader = tokio::spawn(async move { client.get("key1").await });

        // While the fetch is parked, the session drops, the mirror is
        // cleared, and a fresh registration completes.
        entered.notified().await;
        health.set(SessionState::Disconnected);
        cache.write().await.clear();
        health.set(SessionState::Reregistering);
        health.set(SessionState::Registered);
        release.notify_one();

        // The caller still gets the value...
        let value = reader.await.unwrap().unwrap();
        assert_eq!(value, Some("v1".to_string()));

        // ...but it must not land in the mirror: the read happened while
        // no server session tracked it, so no invalidation would ever
        // arrive for it under the new session.
        assert_eq!(cache.read().await.get("key1"), None);
    }
}
