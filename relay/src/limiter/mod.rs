//! Fixed-window rate limiter port.
//!
//! Counters are keyed by `(scope, window_start)` and reset implicitly when
//! the window rolls. This is a coarse defensive floor in front of the
//! upstream provider, not a precise traffic shaper. Two instances are wired:
//! a global one across all items and a per-item one.

mod memory;
mod redis;

pub use memory::MemoryRateLimiter;
pub use redis::RedisRateLimiter;

use std::future::Future;
use std::time::Duration;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{RelayError, RelayResult};

/// Scope key of the limiter shared by all upstream calls.
pub const GLOBAL_LIMITER_KEY: &str = "provider_client";

/// Production upstream allowance across all items: 2500 requests per minute.
pub const DEFAULT_GLOBAL_LIMIT: u64 = 2500;

/// Production upstream allowance per item: 50 requests per minute.
pub const DEFAULT_ITEM_LIMIT: u64 = 50;

/// Default limiter window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Extra lifetime on window counters beyond the window itself, so a counter
/// never expires while its window is still being read.
pub(crate) const WINDOW_EXPIRY_GRACE: Duration = Duration::from_secs(10);

/// Builds the per-item limiter scope key.
pub fn item_limiter_key(item_id: impl std::fmt::Display) -> String {
    format!("provider_item:{item_id}")
}

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Denied until the current window rolls over.
    Denied { retry_after: Duration },
}

/// Trait for the fixed-window rate limiter.
pub trait RateLimiter: Sync {
    /// Atomically counts a request against the current window.
    ///
    /// Denials report how long until the next window starts.
    fn allow(&self, key: &str) -> impl Future<Output = RelayResult<Decision>> + Send;

    /// Blocks until the limiter admits the request or shutdown wins.
    ///
    /// Cancellation surfaces as `Cancelled`, never as a limiter error.
    fn wait(
        &self,
        key: &str,
        shutdown: &mut ShutdownRx,
    ) -> impl Future<Output = RelayResult<()>> + Send {
        async move {
            loop {
                match self.allow(key).await? {
                    Decision::Allowed => return Ok(()),
                    Decision::Denied { retry_after } => {
                        tokio::select! {
                            _ = tokio::time::sleep(retry_after) => {}
                            _ = shutdown.changed() => return Err(RelayError::cancelled()),
                        }
                    }
                }
            }
        }
    }
}

/// Start of the fixed window containing `now_ms`, plus the delay until the
/// next window opens.
pub(crate) fn window_bounds(now_ms: i64, window: Duration) -> (i64, Duration) {
    let window_ms = window.as_millis() as i64;
    let window_start = now_ms - now_ms.rem_euclid(window_ms);
    let retry_after = Duration::from_millis((window_start + window_ms - now_ms) as u64);

    (window_start, retry_after)
}
