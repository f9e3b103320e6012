use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};
use crate::store::{ItemStore, TransactionStore};
use crate::types::{Item, SyncStatus, Transaction};

/// Inner state of [`MemoryStore`].
#[derive(Debug, Default)]
struct Inner {
    items: HashMap<Uuid, Item>,
    /// Secondary index mirroring the unique constraint on the provider item id.
    items_by_provider_id: HashMap<String, Uuid>,
    /// Transactions keyed by provider transaction id, the upsert key.
    transactions: HashMap<String, Transaction>,
}

/// In-memory store for items and transactions.
///
/// Implements both [`ItemStore`] and [`TransactionStore`] with the same
/// conflict and tombstone semantics as the Postgres store. Used by tests and
/// local development; all data is lost on process exit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the transactions held for an item.
    pub async fn transactions_for_item(&self, item_id: Uuid) -> Vec<Transaction> {
        let inner = self.inner.lock().await;

        inner
            .transactions
            .values()
            .filter(|tx| tx.item_id == item_id)
            .cloned()
            .collect()
    }

    /// Returns one transaction by its provider id, if present.
    pub async fn transaction(&self, provider_transaction_id: &str) -> Option<Transaction> {
        let inner = self.inner.lock().await;

        inner.transactions.get(provider_transaction_id).cloned()
    }
}

impl ItemStore for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> RelayResult<Item> {
        let inner = self.inner.lock().await;

        inner
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| RelayError::item_not_found(id))
    }

    async fn get_by_provider_item_id(&self, provider_item_id: &str) -> RelayResult<Item> {
        let inner = self.inner.lock().await;

        inner
            .items_by_provider_id
            .get(provider_item_id)
            .and_then(|id| inner.items.get(id))
            .cloned()
            .ok_or_else(|| RelayError::item_not_found(provider_item_id))
    }

    async fn create(&self, item: &Item) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;

        if inner
            .items_by_provider_id
            .contains_key(&item.provider_item_id)
        {
            return Err(RelayError::item_already_exists(&item.provider_item_id));
        }

        inner
            .items_by_provider_id
            .insert(item.provider_item_id.clone(), item.id);
        inner.items.insert(item.id, item.clone());

        Ok(())
    }

    async fn update_success(&self, id: Uuid, cursor: &str) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;

        let item = inner
            .items
            .get_mut(&id)
            .ok_or_else(|| RelayError::item_not_found(id))?;

        let now = Utc::now();
        item.next_cursor = cursor.to_string();
        item.sync_status = SyncStatus::Active;
        item.error_message = None;
        item.last_synced_at = Some(now);
        item.updated_at = now;

        Ok(())
    }

    async fn mark_resyncing(&self, id: Uuid) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;

        let item = inner
            .items
            .get_mut(&id)
            .ok_or_else(|| RelayError::item_not_found(id))?;

        item.sync_status = SyncStatus::Resyncing;
        item.updated_at = Utc::now();

        Ok(())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;

        let item = inner
            .items
            .get_mut(&id)
            .ok_or_else(|| RelayError::item_not_found(id))?;

        item.sync_status = SyncStatus::Error;
        item.error_message = Some(message.to_string());
        item.updated_at = Utc::now();

        Ok(())
    }
}

impl TransactionStore for MemoryStore {
    async fn upsert_batch(&self, transactions: &[Transaction]) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        for tx in transactions {
            match inner.transactions.get_mut(&tx.provider_transaction_id) {
                Some(existing) => {
                    // Overwrite the mutable fields and clear the tombstone,
                    // keeping the original local id and created_at.
                    existing.amount_cents = tx.amount_cents;
                    existing.currency_code = tx.currency_code.clone();
                    existing.date = tx.date;
                    existing.merchant_name = tx.merchant_name.clone();
                    existing.provider_pending_id = tx.provider_pending_id.clone();
                    existing.status = tx.status;
                    existing.raw_payload = tx.raw_payload.clone();
                    existing.is_removed = false;
                    existing.updated_at = now;
                }
                None => {
                    let mut row = tx.clone();
                    row.is_removed = false;
                    row.created_at = now;
                    row.updated_at = now;
                    inner
                        .transactions
                        .insert(row.provider_transaction_id.clone(), row);
                }
            }
        }

        Ok(())
    }

    async fn mark_removed_batch(
        &self,
        item_id: Uuid,
        provider_transaction_ids: &[String],
    ) -> RelayResult<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        for id in provider_transaction_ids {
            if let Some(tx) = inner.transactions.get_mut(id) {
                if tx.item_id == item_id {
                    tx.is_removed = true;
                    tx.updated_at = now;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionStatus;
    use chrono::NaiveDate;

    fn sample_transaction(item_id: Uuid, provider_id: &str, amount_cents: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            item_id,
            provider_transaction_id: provider_id.to_string(),
            provider_pending_id: None,
            amount_cents,
            currency_code: "USD".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            merchant_name: "Coffee Corner".to_string(),
            status: TransactionStatus::Posted,
            is_removed: false,
            raw_payload: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_provider_item_id() {
        let store = MemoryStore::new();
        let item = Item::new(Uuid::new_v4(), "provider-item", "token");

        store.create(&item).await.unwrap();

        let duplicate = Item::new(Uuid::new_v4(), "provider-item", "other-token");
        let err = store.create(&duplicate).await.unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::ErrorKind::ItemAlreadyExists { .. }
        ));
    }

    #[tokio::test]
    async fn update_success_checkpoints_cursor_and_clears_error() {
        let store = MemoryStore::new();
        let item = Item::new(Uuid::new_v4(), "provider-item", "token");
        store.create(&item).await.unwrap();
        store.mark_error(item.id, "boom").await.unwrap();

        store.update_success(item.id, "C1").await.unwrap();

        let stored = store.get_by_id(item.id).await.unwrap();
        assert_eq!(stored.next_cursor, "C1");
        assert_eq!(stored.sync_status, SyncStatus::Active);
        assert_eq!(stored.error_message, None);
        assert!(stored.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn upsert_batch_is_idempotent() {
        let store = MemoryStore::new();
        let item_id = Uuid::new_v4();
        let batch = vec![
            sample_transaction(item_id, "tx-1", 1250),
            sample_transaction(item_id, "tx-2", -300),
        ];

        store.upsert_batch(&batch).await.unwrap();
        store.upsert_batch(&batch).await.unwrap();

        let rows = store.transactions_for_item(item_id).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|tx| !tx.is_removed));
    }

    #[tokio::test]
    async fn upsert_clears_tombstone_and_overwrites_fields() {
        let store = MemoryStore::new();
        let item_id = Uuid::new_v4();

        store
            .upsert_batch(&[sample_transaction(item_id, "tx-1", 1000)])
            .await
            .unwrap();
        store
            .mark_removed_batch(item_id, &["tx-1".to_string()])
            .await
            .unwrap();
        assert!(store.transaction("tx-1").await.unwrap().is_removed);

        let mut updated = sample_transaction(item_id, "tx-1", 1400);
        updated.merchant_name = "Coffee Corner Uptown".to_string();
        store.upsert_batch(&[updated]).await.unwrap();

        let row = store.transaction("tx-1").await.unwrap();
        assert!(!row.is_removed);
        assert_eq!(row.amount_cents, 1400);
        assert_eq!(row.merchant_name, "Coffee Corner Uptown");
    }

    #[tokio::test]
    async fn mark_removed_ignores_unknown_ids_and_other_items() {
        let store = MemoryStore::new();
        let item_id = Uuid::new_v4();
        let other_item = Uuid::new_v4();

        store
            .upsert_batch(&[
                sample_transaction(item_id, "tx-1", 1000),
                sample_transaction(other_item, "tx-2", 2000),
            ])
            .await
            .unwrap();

        store
            .mark_removed_batch(
                item_id,
                &[
                    "tx-1".to_string(),
                    "tx-2".to_string(),
                    "never-seen".to_string(),
                ],
            )
            .await
            .unwrap();

        assert!(store.transaction("tx-1").await.unwrap().is_removed);
        // tx-2 belongs to another item and must be untouched.
        assert!(!store.transaction("tx-2").await.unwrap().is_removed);
    }
}
