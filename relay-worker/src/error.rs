use thiserror::Error;

use relay::error::RelayError;
use relay_config::LoadConfigError;
use relay_telemetry::tracing::InitTracingError;

/// Result type for worker startup and shutdown.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Error type for the worker binary.
///
/// Wraps [`RelayError`] for sync pipeline errors and provides variants for
/// infrastructure failures during startup.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(#[from] LoadConfigError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] InitTracingError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] fred::error::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),
}
