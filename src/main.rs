//! Sidecache - a client-side Redis cache
//!
//! Binary entry point: registers the tracking session, starts the
//! invalidation listener, then drives a synthetic read/write workload
//! against the cached client while reporting statistics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::signal;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sidecache::{
    register, spawn_invalidation_listener, BoundedCache, CacheStats, CachedClient, Config,
    ListenerContext, SessionHealth, SessionState,
};

/// Payload written to every workload key, matching a fixed-size record.
const SEED_VALUE: &str = "XXXXX";

/// Main entry point for the caching client.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the data path, flush and seed the workload keyspace
/// 4. Register the tracking session (startup-fatal on failure)
/// 5. Start the invalidation listener and the stats reporter
/// 6. Run the read/write workload until Ctrl+C / SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sidecache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sidecache client");

    let config = Config::from_env();
    info!(
        "Configuration loaded: redis_url={}, capacity={:?}, keyspace={}, read_ratio={}, fetch_timeout={}ms",
        config.redis_url,
        config.cache_capacity,
        config.keyspace_size,
        config.read_ratio,
        config.fetch_timeout_ms
    );

    let data_client =
        redis::Client::open(config.redis_url.clone()).context("invalid REDIS_URL")?;
    let dedicated_client =
        redis::Client::open(config.dedicated_url()).context("invalid REDIS_URL")?;

    let mut data = data_client
        .get_multiplexed_async_connection()
        .await
        .context("data-path connection failed")?;

    // Reset the server and seed the workload keyspace
    redis::cmd("FLUSHALL")
        .exec_async(&mut data)
        .await
        .context("FLUSHALL failed")?;
    for i in 0..config.keyspace_size {
        data.set::<_, _, ()>(format!("X{i}"), SEED_VALUE)
            .await
            .context("seeding keyspace failed")?;
    }
    info!("Seeded {} keys", config.keyspace_size);

    let cache = Arc::new(RwLock::new(BoundedCache::new(config.cache_capacity)));
    let stats = Arc::new(CacheStats::new());
    let health = SessionHealth::new();

    // Registration is startup-fatal: without invalidation delivery the
    // mirror must never be served.
    let session = register(&dedicated_client, &mut data)
        .await
        .context("tracking registration failed")?;
    health.set(SessionState::Registered);

    let listener_handle = spawn_invalidation_listener(
        ListenerContext {
            dedicated_client,
            data: data.clone(),
            cache: Arc::clone(&cache),
            stats: Arc::clone(&stats),
            health: health.clone(),
        },
        session,
    );

    let report_handle = spawn_report_task(
        Arc::clone(&stats),
        Arc::clone(&cache),
        config.report_interval,
    );

    let mut client = CachedClient::new(
        data.clone(),
        cache,
        stats,
        health,
        Duration::from_millis(config.fetch_timeout_ms),
    );

    info!("Workload running, press Ctrl+C to stop");
    tokio::select! {
        result = run_workload(&mut client, &mut data, &config) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    listener_handle.abort();
    report_handle.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Drives random reads through the cached client and direct writes on
/// the data path, mixed per the configured read ratio. Writes to tracked
/// keys are what trigger the server's invalidation pushes.
async fn run_workload(
    client: &mut CachedClient<MultiplexedConnection>,
    writer: &mut MultiplexedConnection,
    config: &Config,
) -> anyhow::Result<()> {
    loop {
        let (key, is_read) = {
            let mut rng = rand::thread_rng();
            (
                format!("X{}", rng.gen_range(0..config.keyspace_size)),
                rng.gen::<f64>() < config.read_ratio,
            )
        };

        if is_read {
            if let Err(e) = client.get(&key).await {
                warn!(key = %key, error = %e, "read failed");
            }
        } else {
            writer
                .set::<_, _, ()>(&key, SEED_VALUE)
                .await
                .context("workload write failed")?;
        }
    }
}

/// Spawns a background task that periodically logs a statistics snapshot.
fn spawn_report_task(
    stats: Arc<CacheStats>,
    cache: Arc<RwLock<BoundedCache>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let snapshot = stats.snapshot();
            let entries = cache.read().await.len();
            info!(
                hits = snapshot.hits,
                misses = snapshot.misses,
                invalidations = snapshot.invalidations,
                evictions = snapshot.evictions,
                entries,
                hit_rate = snapshot.hit_rate,
                avg_latency_us = snapshot.avg_latency_us,
                "cache statistics"
            );
        }
    })
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
