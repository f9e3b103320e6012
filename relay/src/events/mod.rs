//! Sync event publication port.
//!
//! After each persisted sync page the orchestrator broadcasts a delta
//! notification for downstream reconcilers. Delivery is fan-out and
//! fire-and-forget from the subscriber's point of view, but a publish
//! failure aborts the current job: losing events silently would leave
//! reconcilers permanently behind, while re-running the job only duplicates
//! them.

mod memory;
mod redis;

pub use memory::MemoryEventPublisher;
pub use redis::RedisEventPublisher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use uuid::Uuid;

use crate::error::RelayResult;

/// Channel on which sync events are published.
pub const SYNC_EVENTS_TOPIC: &str = "sync-events";

/// Event type discriminator carried in the payload.
pub const SYNC_UPDATES_EVENT_TYPE: &str = "SYNC_UPDATES";

/// Per-page delta counts carried by a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

/// Wire payload of one sync event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub item_id: Uuid,
    pub counts: SyncCounts,
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    /// Builds a sync-updates event stamped with the current time.
    pub fn sync_updates(item_id: Uuid, added: usize, modified: usize, removed: usize) -> Self {
        SyncEvent {
            event_type: SYNC_UPDATES_EVENT_TYPE.to_string(),
            item_id,
            counts: SyncCounts {
                added,
                modified,
                removed,
            },
            timestamp: Utc::now(),
        }
    }
}

/// Trait for broadcasting per-sync deltas to subscribers.
pub trait EventPublisher {
    /// Publishes the delta counts of one persisted sync page.
    fn publish_sync_events(
        &self,
        item_id: Uuid,
        added: usize,
        modified: usize,
        removed: usize,
    ) -> impl Future<Output = RelayResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_payload_shape() {
        let item_id = Uuid::new_v4();
        let event = SyncEvent::sync_updates(item_id, 2, 0, 1);

        let payload = serde_json::to_value(&event).unwrap();
        assert_eq!(payload["type"], "SYNC_UPDATES");
        assert_eq!(payload["item_id"], item_id.to_string());
        assert_eq!(payload["counts"]["added"], 2);
        assert_eq!(payload["counts"]["removed"], 1);
        // RFC3339 timestamps serialize with a timezone designator.
        assert!(payload["timestamp"].as_str().unwrap().contains('T'));
    }
}
