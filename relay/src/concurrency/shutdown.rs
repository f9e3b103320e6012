//! Broadcast shutdown signal.
//!
//! A single watch channel fans the shutdown request out to every worker and
//! every suspension point (queue dequeue, limiter sleeps). Receivers observe
//! the signal either by awaiting `changed()` inside a `select!` or by
//! sampling the current value.

use tokio::sync::watch;

/// Transmitter side of the shutdown signal.
pub type ShutdownTx = watch::Sender<bool>;

/// Receiver side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<bool>;

/// Creates a shutdown signal channel in the "running" state.
pub fn create_shutdown() -> (ShutdownTx, ShutdownRx) {
    watch::channel(false)
}

/// Returns true once shutdown has been requested.
pub fn is_shutdown(rx: &ShutdownRx) -> bool {
    *rx.borrow()
}
