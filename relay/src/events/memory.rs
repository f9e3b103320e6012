use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::events::{EventPublisher, SyncEvent};

/// In-memory event publisher for tests.
///
/// Records every published event and can be toggled to fail, which lets
/// tests assert that a publish failure aborts the sync.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventPublisher {
    events: Arc<Mutex<Vec<SyncEvent>>>,
    fail_next: Arc<AtomicBool>,
}

impl MemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail until reset.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Returns the events published so far.
    pub async fn published(&self) -> Vec<SyncEvent> {
        self.events.lock().await.clone()
    }
}

impl EventPublisher for MemoryEventPublisher {
    async fn publish_sync_events(
        &self,
        item_id: Uuid,
        added: usize,
        modified: usize,
        removed: usize,
    ) -> RelayResult<()> {
        if self.fail_next.load(Ordering::SeqCst) {
            return Err(RelayError::new(ErrorKind::EventPublishFailed));
        }

        let event = SyncEvent::sync_updates(item_id, added, modified, removed);
        self.events.lock().await.push(event);

        Ok(())
    }
}
