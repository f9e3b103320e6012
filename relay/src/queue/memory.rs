use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::queue::JobQueue;
use crate::types::SyncJob;

/// In-memory job queue for tests.
///
/// Preserves the blocking-dequeue contract of the Redis queue: `dequeue`
/// parks until a job arrives or the timeout elapses.
#[derive(Clone)]
pub struct MemoryJobQueue {
    sender: UnboundedSender<SyncJob>,
    receiver: Arc<Mutex<UnboundedReceiver<SyncJob>>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &SyncJob) -> RelayResult<()> {
        self.sender
            .send(job.clone())
            .map_err(|err| RelayError::with_source(ErrorKind::QueueTransport, err))?;

        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> RelayResult<Option<SyncJob>> {
        let mut receiver = self.receiver.lock().await;

        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(job)) => Ok(Some(job)),
            // All senders dropped; treat as an empty queue.
            Ok(None) => Ok(None),
            Err(_) => Ok(None),
        }
    }
}
