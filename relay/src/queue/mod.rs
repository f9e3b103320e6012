//! Job queue port.
//!
//! A FIFO queue of [`SyncJob`]s with at-least-once delivery. Duplicates are
//! permitted; webhook intake may enqueue the same item twice, and the
//! per-item lock plus the cursor protocol make re-processing safe.

mod memory;
mod redis;

pub use memory::MemoryJobQueue;
pub use redis::RedisJobQueue;

use std::future::Future;
use std::time::Duration;

use crate::error::RelayResult;
use crate::types::SyncJob;

/// Trait for the persistent sync job queue.
pub trait JobQueue {
    /// Appends a job to the tail of the queue.
    fn enqueue(&self, job: &SyncJob) -> impl Future<Output = RelayResult<()>> + Send;

    /// Pops the job at the head of the queue, blocking up to `timeout`.
    ///
    /// Returns `None` on timeout; an error is returned only on transport
    /// failure.
    fn dequeue(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = RelayResult<Option<SyncJob>>> + Send;
}
