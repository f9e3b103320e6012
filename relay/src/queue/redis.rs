use fred::prelude::{ListInterface, Pool};
use std::time::Duration;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::queue::JobQueue;
use crate::types::SyncJob;

/// Redis-backed job queue.
///
/// Jobs are JSON payloads on a Redis list: `RPUSH` appends to the tail and a
/// blocking `BLPOP` pops from the head, which gives FIFO ordering per
/// producer and at-least-once delivery across workers.
#[derive(Clone)]
pub struct RedisJobQueue {
    client: Pool,
    queue_key: String,
}

impl RedisJobQueue {
    pub fn new(client: Pool, queue_key: impl Into<String>) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
        }
    }
}

impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &SyncJob) -> RelayResult<()> {
        let payload = serde_json::to_string(job)?;

        self.client
            .rpush::<i64, _, _>(self.queue_key.as_str(), payload)
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::QueueTransport, err))?;

        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> RelayResult<Option<SyncJob>> {
        // BLPOP returns (key, value) or nil once the timeout elapses.
        let entry: Option<(String, String)> = self
            .client
            .blpop(self.queue_key.as_str(), timeout.as_secs_f64())
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::QueueTransport, err))?;

        let Some((_, payload)) = entry else {
            return Ok(None);
        };

        let job = serde_json::from_str(&payload)
            .map_err(|err| RelayError::with_source(ErrorKind::QueueDecodeFailed, err))?;

        Ok(Some(job))
    }
}
