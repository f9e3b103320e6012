use std::net::TcpListener;

use actix_web::{App, HttpServer, dev::Server, web, web::Data};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_actix_web::TracingLogger;

use relay::provider::HttpProviderClient;
use relay::queue::RedisJobQueue;
use relay::redis::{RedisConfig, connect_redis};
use relay::store::PostgresStore;
use relay_config::RelayConfig;

use crate::routes::health::health_check;
use crate::routes::link::{create_item, create_link_token};
use crate::routes::webhooks::provider_webhook;

/// Maximum accepted webhook / request body size: 1 MiB.
const MAX_PAYLOAD_BYTES: usize = 1_048_576;

/// Relay API application server wrapper.
///
/// Manages the HTTP server lifecycle including startup and migration.
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Builds and configures the API application server.
    ///
    /// Sets up the database pool, the Redis-backed job queue and the
    /// provider client, then binds the HTTP server with all routes and
    /// middleware configured.
    pub async fn build(config: RelayConfig) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&config).await?;

        let (redis_host, redis_port) = config.redis_host_port()?;
        let redis_pool = connect_redis(RedisConfig {
            host: redis_host,
            port: redis_port,
            password: config.redis_password.clone(),
            database: config.redis_db,
            ..RedisConfig::default()
        })
        .await?;

        let store = PostgresStore::new(connection_pool);
        let queue = RedisJobQueue::new(redis_pool, &config.queue_key);
        let provider = HttpProviderClient::new(
            config.provider_env.into(),
            &config.provider_client_id,
            &config.provider_secret,
        );

        let address = format!("{}:{}", config.api_host, config.api_port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();
        info!(port, "starting relay api");

        let store = Data::new(store);
        let queue = Data::new(queue);
        let provider = Data::new(provider);

        let server = HttpServer::new(move || {
            App::new()
                .wrap(TracingLogger::default())
                .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
                .app_data(store.clone())
                .app_data(queue.clone())
                .app_data(provider.clone())
                .service(health_check)
                .service(provider_webhook)
                .service(create_link_token)
                .service(create_item)
        })
        .listen(listener)?
        .run();

        Ok(Self { port, server })
    }

    /// The port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Runs the server until it is stopped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }

    /// Applies pending database migrations.
    pub async fn migrate_database(config: &RelayConfig) -> Result<(), anyhow::Error> {
        let connection_pool = get_connection_pool(config).await?;
        sqlx::migrate!("./migrations").run(&connection_pool).await?;

        Ok(())
    }
}

async fn get_connection_pool(config: &RelayConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
}
