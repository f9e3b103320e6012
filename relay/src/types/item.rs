use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Sync eligibility status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The item syncs normally.
    Active,
    /// The upstream invalidated the cursor; the item is replaying history
    /// from an empty cursor.
    Resyncing,
    /// Syncing stopped until an operator or end-user intervenes.
    Error,
}

impl SyncStatus {
    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Active => "active",
            SyncStatus::Resyncing => "resyncing",
            SyncStatus::Error => "error",
        }
    }

    /// Parses a stored status string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SyncStatus::Active),
            "resyncing" => Some(SyncStatus::Resyncing),
            "error" => Some(SyncStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connection between a tenant and the upstream provider.
///
/// The cursor is only advanced after the batch fetched for it has been
/// durably persisted, so a crash mid-sync replays the same delta. Items are
/// mutated only by the sync orchestrator; webhook intake just reads them.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Upstream-assigned identifier, unique across all items.
    pub provider_item_id: String,
    /// Encrypted access token, opaque to the relay.
    pub access_token_enc: String,

    /// Opaque pagination cursor; empty means "from the beginning".
    pub next_cursor: String,
    pub sync_status: SyncStatus,
    pub error_message: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Creates a freshly linked item with an empty cursor.
    pub fn new(
        tenant_id: Uuid,
        provider_item_id: impl Into<String>,
        access_token_enc: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Item {
            id: Uuid::new_v4(),
            tenant_id,
            provider_item_id: provider_item_id.into(),
            access_token_enc: access_token_enc.into(),
            next_cursor: String::new(),
            sync_status: SyncStatus::Active,
            error_message: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true when the item is eligible to sync.
    pub fn can_sync(&self) -> bool {
        matches!(
            self.sync_status,
            SyncStatus::Active | SyncStatus::Resyncing
        )
    }

    /// Returns true when the item is stopped on an error.
    pub fn has_error(&self) -> bool {
        self.sync_status == SyncStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [SyncStatus::Active, SyncStatus::Resyncing, SyncStatus::Error] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SyncStatus::parse("paused"), None);
    }

    #[test]
    fn only_active_and_resyncing_can_sync() {
        let mut item = Item::new(Uuid::new_v4(), "provider-item", "token");
        assert!(item.can_sync());

        item.sync_status = SyncStatus::Resyncing;
        assert!(item.can_sync());

        item.sync_status = SyncStatus::Error;
        assert!(!item.can_sync());
        assert!(item.has_error());
    }
}
