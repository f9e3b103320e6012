use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "info";

/// Errors that can occur while initializing tracing.
#[derive(Debug, Error)]
pub enum InitTracingError {
    /// A global subscriber was already installed.
    #[error("failed to install the tracing subscriber")]
    Init(#[from] TryInitError),
}

/// Initializes the global tracing subscriber for a binary.
///
/// Log verbosity comes from `RUST_LOG` with an `info` default. The service
/// name is attached to every event so multi-service log streams stay
/// attributable.
pub fn init_tracing(service_name: &str) -> Result<(), InitTracingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    ::tracing::info!(service = service_name, "tracing initialized");

    Ok(())
}
