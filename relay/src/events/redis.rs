use fred::prelude::{Pool, PubsubInterface};
use uuid::Uuid;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::events::{EventPublisher, SYNC_EVENTS_TOPIC, SyncEvent};

/// Redis pub/sub event publisher.
///
/// Publishes JSON sync events on the `sync-events` channel. Subscribers that
/// are offline miss events; downstream consumers needing a complete stream
/// reconcile from the store.
#[derive(Clone)]
pub struct RedisEventPublisher {
    client: Pool,
}

impl RedisEventPublisher {
    pub fn new(client: Pool) -> Self {
        Self { client }
    }
}

impl EventPublisher for RedisEventPublisher {
    async fn publish_sync_events(
        &self,
        item_id: Uuid,
        added: usize,
        modified: usize,
        removed: usize,
    ) -> RelayResult<()> {
        let event = SyncEvent::sync_updates(item_id, added, modified, removed);
        let payload = serde_json::to_string(&event)?;

        self.client
            .next()
            .publish::<i64, _, _>(SYNC_EVENTS_TOPIC, payload)
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::EventPublishFailed, err))?;

        Ok(())
    }
}
