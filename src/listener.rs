//! Invalidation Listener Task
//!
//! Background task that consumes invalidation pushes from the dedicated
//! subscription connection and removes the named keys from the local
//! mirror, in the order the server sent them.
//!
//! If the dedicated connection drops, the mirror is unmonitored and must
//! not be served. Chosen recovery policy: disable cache reads, clear the
//! mirror, and re-register under a fresh client id with exponential
//! backoff; cached reads resume only once registration succeeds.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{PushInfo, PushKind, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{BoundedCache, CacheStats};
use crate::error::CacheError;
use crate::session::{register, Session, SessionHealth, SessionState, INVALIDATION_CHANNEL};

/// Ceiling for the re-registration backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

// == Invalidation ==
/// A single decoded invalidation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Remove these keys from the mirror if present
    Keys(Vec<String>),
    /// The server flushed; drop the entire mirror
    FlushAll,
}

// == Listener Context ==
/// Everything the listener needs to run and to recover the session.
pub struct ListenerContext {
    /// RESP3 client used to reopen the dedicated connection
    pub dedicated_client: redis::Client,
    /// Data-path connection for re-enabling tracking after a reconnect
    pub data: MultiplexedConnection,
    /// The shared local mirror
    pub cache: Arc<RwLock<BoundedCache>>,
    /// Shared performance counters
    pub stats: Arc<CacheStats>,
    /// Session state consulted by the accessor
    pub health: SessionHealth,
}

// == Spawn ==
/// Spawns the invalidation listener on a dedicated task.
///
/// Runs for the process lifetime; the returned handle is only used to
/// abort it during shutdown.
pub fn spawn_invalidation_listener(mut ctx: ListenerContext, session: Session) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            client_id = session.client_id,
            "invalidation listener started"
        );
        let mut session = session;
        let mut backoff = Duration::from_secs(1);

        loop {
            let reason = consume(&mut session, &ctx.cache, &ctx.stats).await;

            // The mirror is unmonitored from this moment on: stop
            // trusting it before anything else.
            ctx.health.set(SessionState::Disconnected);
            let dropped = ctx.cache.write().await.clear();
            error!(%reason, dropped, "invalidation connection lost, cache reads disabled");

            loop {
                ctx.health.set(SessionState::Reregistering);
                match register(&ctx.dedicated_client, &mut ctx.data).await {
                    Ok(fresh) => {
                        session = fresh;
                        ctx.health.set(SessionState::Registered);
                        backoff = Duration::from_secs(1);
                        info!(
                            client_id = session.client_id,
                            "re-registered, cache reads re-enabled"
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "re-registration failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }
    })
}

// == Consume ==
/// Processes pushes until the connection is lost; returns the reason.
async fn consume(
    session: &mut Session,
    cache: &RwLock<BoundedCache>,
    stats: &CacheStats,
) -> CacheError {
    loop {
        match session.pushes.recv().await {
            Some(push) if push.kind == PushKind::Disconnection => {
                return CacheError::ListenerLost("server closed the connection".to_string());
            }
            Some(push) => {
                if let Some(invalidation) = parse_push(&push) {
                    apply(cache, stats, invalidation).await;
                }
            }
            None => {
                return CacheError::ListenerLost("push channel closed".to_string());
            }
        }
    }
}

// == Parse ==
/// Decodes a push message into an invalidation event.
///
/// Handles both delivery shapes: pubsub `message` events on the
/// invalidation channel (tracking redirect mode) and direct RESP3
/// `invalidate` pushes. Every other push kind, and messages on other
/// channels, are ignored.
///
/// A nil or empty key-list payload means the server flushed and the
/// whole mirror must go.
pub fn parse_push(push: &PushInfo) -> Option<Invalidation> {
    let payload = match push.kind {
        PushKind::Message => {
            match push.data.first() {
                Some(Value::BulkString(channel))
                    if channel.as_slice() == INVALIDATION_CHANNEL.as_bytes() => {}
                _ => return None,
            }
            push.data.get(1)?
        }
        PushKind::Invalidate => push.data.first()?,
        _ => return None,
    };

    match payload {
        Value::Nil => Some(Invalidation::FlushAll),
        Value::Array(items) => {
            let keys: Vec<String> = items.iter().filter_map(value_as_key).collect();
            if keys.is_empty() {
                Some(Invalidation::FlushAll)
            } else {
                Some(Invalidation::Keys(keys))
            }
        }
        other => value_as_key(other).map(|key| Invalidation::Keys(vec![key])),
    }
}

/// Extracts a key name from a protocol value.
fn value_as_key(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

// == Apply ==
/// Applies one invalidation event to the mirror.
///
/// Absent keys are a no-op; the invalidation counter only reflects keys
/// actually removed.
pub async fn apply(cache: &RwLock<BoundedCache>, stats: &CacheStats, invalidation: Invalidation) {
    match invalidation {
        Invalidation::Keys(keys) => {
            let removed = {
                let mut cache = cache.write().await;
                keys.iter().filter(|key| cache.delete(key)).count() as u64
            };
            stats.record_invalidations(removed);
            debug!(keys = keys.len(), removed, "processed invalidation");
        }
        Invalidation::FlushAll => {
            let removed = cache.write().await.clear() as u64;
            stats.record_invalidations(removed);
            info!(removed, "server flush, cleared entire local cache");
        }
    }
}
