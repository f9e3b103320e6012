//! Shared Redis connectivity for the queue, lock, limiter and publisher
//! adapters.

use fred::prelude::{
    ClientLike, EventInterface, FredResult, Pool, ReconnectPolicy, Server, ServerConfig, TcpConfig,
};
use fred::types::Builder;
use fred::types::config::UnresponsiveConfig;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error};

/// Connection settings for the Redis-backed infrastructure services.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: Option<u8>,
    /// Number of pooled connections shared by the process.
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            database: None,
            pool_size: 5,
        }
    }
}

/// Builds and connects a pooled Redis client.
///
/// Connection errors and unresponsive servers are logged from background
/// tasks; an exponential reconnect policy keeps the pool healthy across
/// Redis restarts.
pub async fn connect_redis(config: RedisConfig) -> FredResult<Pool> {
    let pooled_client = Builder::default_centralized()
        .with_config(|redis_config| {
            redis_config.password = config.password;
            redis_config.database = config.database;
            redis_config.server = ServerConfig::Centralized {
                server: Server::new(config.host, config.port),
            };
        })
        .with_connection_config(|config| {
            config.internal_command_timeout = Duration::from_secs(5);
            config.reconnect_on_auth_error = true;
            config.tcp = TcpConfig {
                ..Default::default()
            };
            config.unresponsive = UnresponsiveConfig {
                max_timeout: Some(Duration::from_secs(10)),
                interval: Duration::from_secs(3),
            };
        })
        .set_policy(ReconnectPolicy::new_exponential(0, 1, 2000, 5))
        .build_pool(config.pool_size)?;

    for client in pooled_client.clients() {
        let mut error_rx = client.error_rx();
        let mut reconnect_rx = client.reconnect_rx();
        let mut unresponsive_rx = client.unresponsive_rx();

        tokio::spawn(async move {
            loop {
                match error_rx.recv().await {
                    Ok((error, Some(server))) => {
                        error!("redis client ({server:?}) error: {error:?}");
                    }
                    Ok((error, None)) => {
                        error!("redis client error: {error:?}");
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tokio::spawn(async move {
            loop {
                match unresponsive_rx.recv().await {
                    Ok(server) => {
                        error!("redis client ({server:?}) unresponsive");
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tokio::spawn(async move {
            loop {
                match reconnect_rx.recv().await {
                    Ok(server) => {
                        debug!("redis client connected to {server:?}");
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let client_handles = pooled_client.connect_pool();
    pooled_client.wait_for_connect().await?;

    tokio::spawn(async move {
        let _results = join_all(client_handles).await;
    });

    Ok(pooled_client)
}
