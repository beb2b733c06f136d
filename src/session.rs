//! Session Registrar Module
//!
//! One-time handshake that makes the local mirror trustworthy: a
//! dedicated connection subscribes to the invalidation channel, and the
//! data-path connection enables server-side tracking with invalidations
//! redirected to that connection's client id.
//!
//! Also owns the session health state machine. Cache reads are only
//! trustworthy while the session is `Registered`.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::{AsyncConnectionConfig, PushInfo};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Well-known channel Redis publishes tracking invalidations to.
pub const INVALIDATION_CHANNEL: &str = "__redis__:invalidate";

// == Session State ==
/// Lifecycle of the tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Startup: registration has not completed yet
    Unregistered = 0,
    /// Tracking is live; cached reads are trustworthy
    Registered = 1,
    /// The invalidation connection dropped; the mirror must not be served
    Disconnected = 2,
    /// A fresh registration is being attempted
    Reregistering = 3,
}

// == Session Health ==
#[derive(Debug, Default)]
struct HealthInner {
    state: AtomicU8,
    epoch: AtomicU64,
}

/// Cloneable, lock-free handle to the current session state.
///
/// Checked by the accessor on every read, so it is atomic loads rather
/// than a lock. Alongside the state it carries a registration epoch:
/// a counter that advances every time the session drops. A value read
/// while one epoch was current belongs to that epoch's server-side
/// tracking and must not be cached under a later one.
#[derive(Debug, Clone, Default)]
pub struct SessionHealth {
    inner: Arc<HealthInner>,
}

impl SessionHealth {
    /// Creates a new handle in the `Unregistered` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions the session to a new state.
    ///
    /// Entering `Disconnected` advances the registration epoch: the
    /// server stops tracking reads for the old client id at that
    /// moment, even though a later re-registration restores
    /// `Registered`.
    pub fn set(&self, state: SessionState) {
        if state == SessionState::Disconnected {
            self.inner.epoch.fetch_add(1, Ordering::Release);
        }
        self.inner.state.store(state as u8, Ordering::Release);
    }

    /// Returns the current session state.
    pub fn state(&self) -> SessionState {
        match self.inner.state.load(Ordering::Acquire) {
            1 => SessionState::Registered,
            2 => SessionState::Disconnected,
            3 => SessionState::Reregistering,
            _ => SessionState::Unregistered,
        }
    }

    /// Returns true while cached reads are trustworthy.
    pub fn is_registered(&self) -> bool {
        self.state() == SessionState::Registered
    }

    /// Returns the current registration epoch.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }
}

// == Session ==
/// A live tracking session.
///
/// The dedicated connection must stay alive for the process lifetime:
/// the server redirects invalidations to its client id, and dropping it
/// silently orphans every cached entry.
pub struct Session {
    /// Server-assigned id of the dedicated connection
    pub client_id: i64,
    /// The dedicated subscription connection, held to keep it open
    pub connection: MultiplexedConnection,
    /// Push messages (invalidations, disconnects) from the dedicated connection
    pub pushes: mpsc::UnboundedReceiver<PushInfo>,
}

// == Register ==
/// Performs the registration handshake.
///
/// 1. Opens a dedicated RESP3 connection with a push sender attached
///    (`dedicated_client` must have been opened with `protocol=resp3`,
///    see [`crate::Config::dedicated_url`]).
/// 2. Asks the server for that connection's `CLIENT ID`.
/// 3. Subscribes it to `__redis__:invalidate`.
/// 4. Enables `CLIENT TRACKING ON REDIRECT <id>` on the data path.
///
/// Every failure maps to [`CacheError::Registration`]: without tracking
/// the cache cannot safely operate, so the caller must treat this as
/// fatal and refuse to serve cached reads.
pub async fn register(
    dedicated_client: &redis::Client,
    data: &mut MultiplexedConnection,
) -> Result<Session> {
    let (tx, pushes) = mpsc::unbounded_channel();
    let config = AsyncConnectionConfig::new().set_push_sender(tx);

    let mut connection = dedicated_client
        .get_multiplexed_async_connection_with_config(&config)
        .await
        .map_err(|e| CacheError::Registration(format!("dedicated connection failed: {e}")))?;

    let client_id: i64 = redis::cmd("CLIENT")
        .arg("ID")
        .query_async(&mut connection)
        .await
        .map_err(|e| CacheError::Registration(format!("CLIENT ID failed: {e}")))?;

    connection
        .subscribe(INVALIDATION_CHANNEL)
        .await
        .map_err(|e| CacheError::Registration(format!("subscribe failed: {e}")))?;

    enable_tracking(data, client_id).await?;

    info!(client_id, "client tracking enabled, invalidations redirected");

    Ok(Session {
        client_id,
        connection,
        pushes,
    })
}

// == Enable Tracking ==
/// (Re)enables tracking on the data path, redirected to `client_id`.
///
/// After a listener reconnect the data connection may still be tracking
/// toward the dead client id, and the server rejects `CLIENT TRACKING ON`
/// under a different redirect target. Tracking is switched off first so
/// re-registration cannot wedge; on a fresh connection the `OFF` is a
/// no-op.
async fn enable_tracking(data: &mut impl ConnectionLike, client_id: i64) -> Result<()> {
    redis::cmd("CLIENT")
        .arg("TRACKING")
        .arg("OFF")
        .exec_async(data)
        .await
        .map_err(|e| CacheError::Registration(format!("tracking reset failed: {e}")))?;

    redis::cmd("CLIENT")
        .arg("TRACKING")
        .arg("ON")
        .arg("REDIRECT")
        .arg(client_id)
        .exec_async(data)
        .await
        .map_err(|e| CacheError::Registration(format!("tracking enable rejected: {e}")))?;

    Ok(())
}
