use chrono::Utc;
use fred::prelude::{KeysInterface, Pool};
use std::time::Duration;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::limiter::{Decision, RateLimiter, WINDOW_EXPIRY_GRACE, window_bounds};

/// Redis-backed fixed-window rate limiter.
///
/// One counter per `(scope, window_start)`; `INCR` creates the counter on
/// first use and the expiry set at creation lets Redis garbage-collect old
/// windows. Being shared in Redis, the budget holds across all worker
/// processes.
#[derive(Clone)]
pub struct RedisRateLimiter {
    client: Pool,
    limit: u64,
    window: Duration,
}

impl RedisRateLimiter {
    pub fn new(client: Pool, limit: u64, window: Duration) -> Self {
        Self {
            client,
            limit,
            window,
        }
    }
}

impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &str) -> RelayResult<Decision> {
        let (window_start, retry_after) = window_bounds(Utc::now().timestamp_millis(), self.window);
        let counter_key = format!("rate_limit:{key}:{window_start}");

        let count: i64 = self
            .client
            .incr(counter_key.as_str())
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::LimiterTransport, err))?;

        if count == 1 {
            let expiry = (self.window + WINDOW_EXPIRY_GRACE).as_secs() as i64;
            self.client
                .expire::<i64, _>(counter_key.as_str(), expiry, None)
                .await
                .map_err(|err| RelayError::with_source(ErrorKind::LimiterTransport, err))?;
        }

        if count as u64 > self.limit {
            return Ok(Decision::Denied { retry_after });
        }

        Ok(Decision::Allowed)
    }
}
