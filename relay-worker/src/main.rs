//! Relay worker binary.
//!
//! Runs the pool of sync workers: dequeue a job, acquire the item lock,
//! drive the cursor sync loop, repeat. Shuts down gracefully on SIGINT,
//! letting in-flight jobs observe the cancellation signal.

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use relay::concurrency::shutdown::create_shutdown;
use relay::events::RedisEventPublisher;
use relay::limiter::{DEFAULT_GLOBAL_LIMIT, DEFAULT_ITEM_LIMIT, DEFAULT_WINDOW, RedisRateLimiter};
use relay::lock::RedisSyncLock;
use relay::provider::HttpProviderClient;
use relay::queue::RedisJobQueue;
use relay::redis::{RedisConfig, connect_redis};
use relay::store::PostgresStore;
use relay::sync::Syncer;
use relay::workers::SyncWorkerPool;
use relay_config::{RelayConfig, load_config};
use relay_telemetry::tracing::init_tracing;

use crate::error::WorkerResult;

mod error;

/// Entry point for the worker service.
///
/// Loads configuration, initializes tracing, starts the async runtime and
/// launches the worker pool.
fn main() -> WorkerResult<()> {
    let config = load_config()?;

    init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))?;

    Ok(())
}

async fn async_main(config: RelayConfig) -> WorkerResult<()> {
    info!(provider_env = %config.provider_env, "starting sync-relay worker");

    let connection_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("connected to postgres");

    let (redis_host, redis_port) = config.redis_host_port()?;
    let redis_pool = connect_redis(RedisConfig {
        host: redis_host,
        port: redis_port,
        password: config.redis_password.clone(),
        database: config.redis_db,
        ..RedisConfig::default()
    })
    .await?;
    info!("connected to redis");

    let store = PostgresStore::new(connection_pool);
    let queue = RedisJobQueue::new(redis_pool.clone(), &config.queue_key);
    let lock = RedisSyncLock::new(redis_pool.clone());
    let publisher = RedisEventPublisher::new(redis_pool.clone());
    let provider = HttpProviderClient::new(
        config.provider_env.into(),
        &config.provider_client_id,
        &config.provider_secret,
    );

    // Production limits for the upstream sync endpoint: 2500 req/min per
    // client, 50 req/min per item.
    let global_limiter = RedisRateLimiter::new(redis_pool.clone(), DEFAULT_GLOBAL_LIMIT, DEFAULT_WINDOW);
    let item_limiter = RedisRateLimiter::new(redis_pool, DEFAULT_ITEM_LIMIT, DEFAULT_WINDOW);

    let syncer = Syncer::new(store, provider, lock, publisher, global_limiter, item_limiter)
        .with_lock_ttl(config.lock_ttl);

    let (shutdown_tx, shutdown_rx) = create_shutdown();
    let pool = SyncWorkerPool::new(syncer, queue, config.worker_concurrency, shutdown_rx);
    let handle = pool.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping workers");
    let _ = shutdown_tx.send(true);

    handle.wait().await?;
    info!("shutdown complete");

    Ok(())
}
