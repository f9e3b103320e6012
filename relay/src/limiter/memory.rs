use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::RelayResult;
use crate::limiter::{Decision, RateLimiter, window_bounds};

/// In-memory fixed-window rate limiter for tests.
///
/// Keeps one counter per `(scope, window_start)`; counters from rolled-over
/// windows are dropped lazily on the next check for the same scope.
#[derive(Debug, Clone)]
pub struct MemoryRateLimiter {
    limit: u64,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, (i64, u64)>>>,
}

impl MemoryRateLimiter {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts a request at an explicit timestamp; lets tests pin the window.
    pub async fn allow_at(&self, key: &str, now_ms: i64) -> Decision {
        let (window_start, retry_after) = window_bounds(now_ms, self.window);

        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert((window_start, 0));

        if entry.0 != window_start {
            *entry = (window_start, 0);
        }
        entry.1 += 1;

        if entry.1 > self.limit {
            return Decision::Denied { retry_after };
        }

        Decision::Allowed
    }
}

impl RateLimiter for MemoryRateLimiter {
    async fn allow(&self, key: &str) -> RelayResult<Decision> {
        Ok(self.allow_at(key, Utc::now().timestamp_millis()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::shutdown::create_shutdown;

    #[tokio::test]
    async fn allows_up_to_limit_within_one_window() {
        let limiter = MemoryRateLimiter::new(3, Duration::from_secs(60));
        let now_ms = 600_000;

        for _ in 0..3 {
            assert_eq!(limiter.allow_at("scope", now_ms).await, Decision::Allowed);
        }

        match limiter.allow_at("scope", now_ms + 1_000).await {
            Decision::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(59_000));
            }
            Decision::Allowed => panic!("fourth request must be denied"),
        }
    }

    #[tokio::test]
    async fn window_rollover_resets_the_counter() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));

        assert_eq!(limiter.allow_at("scope", 30_000).await, Decision::Allowed);
        assert!(matches!(
            limiter.allow_at("scope", 31_000).await,
            Decision::Denied { .. }
        ));

        // Next window.
        assert_eq!(limiter.allow_at("scope", 60_000).await, Decision::Allowed);
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));
        let now_ms = 10_000;

        assert_eq!(limiter.allow_at("a", now_ms).await, Decision::Allowed);
        assert_eq!(limiter.allow_at("b", now_ms).await, Decision::Allowed);
    }

    #[tokio::test]
    async fn wait_surfaces_cancellation_not_a_limiter_error() {
        let limiter = MemoryRateLimiter::new(0, Duration::from_secs(3600));
        let (shutdown_tx, mut shutdown_rx) = create_shutdown();

        let wait = limiter.wait("scope", &mut shutdown_rx);
        shutdown_tx.send(true).unwrap();

        let err = wait.await.unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::Cancelled));
    }
}
