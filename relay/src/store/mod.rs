//! Persistence ports for items and transactions.
//!
//! [`ItemStore`] and [`TransactionStore`] define how per-connection metadata
//! and transaction rows are stored. The Postgres implementation backs the
//! running service; the in-memory implementation backs tests.
//!
//! Implementations must keep the batch operations idempotent: re-applying an
//! upsert batch yields the same state, and tombstoning ids that were never
//! seen is silently ignored.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use std::future::Future;
use uuid::Uuid;

use crate::error::RelayResult;
use crate::types::{Item, Transaction};

/// Trait for storing and retrieving per-connection item state.
///
/// All writes are single-statement and atomic at the storage layer. Only the
/// sync orchestrator mutates items.
pub trait ItemStore {
    /// Returns the item with the given local id.
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RelayResult<Item>> + Send;

    /// Returns the item with the given upstream-assigned id.
    fn get_by_provider_item_id(
        &self,
        provider_item_id: &str,
    ) -> impl Future<Output = RelayResult<Item>> + Send;

    /// Inserts a freshly linked item.
    ///
    /// Fails with `ItemAlreadyExists` when the provider item id is already
    /// linked.
    fn create(&self, item: &Item) -> impl Future<Output = RelayResult<()>> + Send;

    /// Checkpoints a successfully persisted sync page.
    ///
    /// Atomically advances the cursor, returns the item to `active`, clears
    /// any error message and stamps `last_synced_at`.
    fn update_success(
        &self,
        id: Uuid,
        cursor: &str,
    ) -> impl Future<Output = RelayResult<()>> + Send;

    /// Transitions the item to `resyncing` after an upstream cursor reset.
    fn mark_resyncing(&self, id: Uuid) -> impl Future<Output = RelayResult<()>> + Send;

    /// Transitions the item to `error` and records the failure message.
    fn mark_error(
        &self,
        id: Uuid,
        message: &str,
    ) -> impl Future<Output = RelayResult<()>> + Send;
}

/// Trait for the idempotent transaction batch protocol.
pub trait TransactionStore {
    /// Inserts or updates each row on conflict on `provider_transaction_id`.
    ///
    /// On conflict the mutable fields are overwritten and the `is_removed`
    /// tombstone is cleared. An empty batch is a no-op.
    fn upsert_batch(
        &self,
        transactions: &[Transaction],
    ) -> impl Future<Output = RelayResult<()>> + Send;

    /// Sets the tombstone on rows of the given item whose provider ids are in
    /// the set.
    ///
    /// Ids that do not match any row are silently ignored; the upstream's
    /// removal list may reference rows the relay never saw.
    fn mark_removed_batch(
        &self,
        item_id: Uuid,
        provider_transaction_ids: &[String],
    ) -> impl Future<Output = RelayResult<()>> + Send;
}
