//! The sync orchestrator.
//!
//! [`Syncer`] runs one job end to end: take the per-item lock, wait on both
//! rate limiters, then drive the cursor pagination loop against the upstream
//! provider, persisting each page before advancing the cursor.
//!
//! The ordering inside the loop is the consistency argument. Transactions
//! are written before the cursor is advanced, so a crash between them
//! re-delivers the same delta and the idempotent upsert absorbs it. Events
//! are published before the checkpoint, so they can be duplicated on crash
//! but never lost. The lock is released last, so no other worker can observe
//! a stale cursor mid-run.

use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::concurrency::shutdown::{ShutdownRx, is_shutdown};
use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::events::EventPublisher;
use crate::limiter::{GLOBAL_LIMITER_KEY, RateLimiter, item_limiter_key};
use crate::lock::{DEFAULT_LOCK_TTL, LockGuard, SyncLock, lock_key};
use crate::provider::ProviderClient;
use crate::store::{ItemStore, TransactionStore};
use crate::types::Item;

/// Orchestrates one sync job per call, generic over the infrastructure
/// ports so tests can substitute in-memory fakes.
#[derive(Debug, Clone)]
pub struct Syncer<S, P, L, E, R> {
    store: S,
    provider: P,
    lock: L,
    publisher: E,
    global_limiter: R,
    item_limiter: R,
    lock_ttl: Duration,
}

impl<S, P, L, E, R> Syncer<S, P, L, E, R>
where
    S: ItemStore + TransactionStore + Sync,
    P: ProviderClient + Sync,
    L: SyncLock + Sync,
    E: EventPublisher + Sync,
    R: RateLimiter,
{
    pub fn new(
        store: S,
        provider: P,
        lock: L,
        publisher: E,
        global_limiter: R,
        item_limiter: R,
    ) -> Self {
        Self {
            store,
            provider,
            lock,
            publisher,
            global_limiter,
            item_limiter,
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Overrides the lock TTL, the fencing horizon for one sync run.
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    /// Synchronizes one item.
    ///
    /// `LockBusy` means another worker owns the item; the caller drops the
    /// job without touching item status.
    pub async fn sync_item(&self, item_id: Uuid, shutdown: &mut ShutdownRx) -> RelayResult<()> {
        let guard = self.lock.acquire(&lock_key(item_id), self.lock_ttl).await?;

        let result = self.sync_locked(item_id, shutdown).await;

        // Release failure is logged only: the TTL reclaims the key, and the
        // compare-and-delete semantics protect any new holder.
        if let Err(err) = guard.release().await {
            warn!(item_id = %item_id, error = %err, "failed to release sync lock");
        }

        result
    }

    async fn sync_locked(&self, item_id: Uuid, shutdown: &mut ShutdownRx) -> RelayResult<()> {
        // Limiter waits happen inside the lock so a busy item queues behind
        // its own budget instead of starving other items.
        self.global_limiter.wait(GLOBAL_LIMITER_KEY, shutdown).await?;
        self.item_limiter
            .wait(&item_limiter_key(item_id), shutdown)
            .await?;

        let item = self.store.get_by_id(item_id).await?;
        if !item.can_sync() {
            // The status is already terminal; do not overwrite it.
            return Err(RelayError::item_not_syncable(item_id, item.sync_status));
        }

        self.process_sync_loop(&item, shutdown).await
    }

    async fn process_sync_loop(&self, item: &Item, shutdown: &ShutdownRx) -> RelayResult<()> {
        let mut cursor = item.next_cursor.clone();

        loop {
            if is_shutdown(shutdown) {
                return Err(RelayError::cancelled());
            }

            let updates = match self
                .provider
                .fetch_sync_updates(&item.access_token_enc, &cursor)
                .await
            {
                Ok(updates) => updates,
                Err(err) => match err.kind() {
                    ErrorKind::CursorReset => {
                        // The upstream invalidated our cursor. Replay from
                        // the beginning; existing rows are reconciled by the
                        // upserts the replay produces, not deleted.
                        info!(item_id = %item.id, "cursor reset requested, restarting from empty cursor");
                        self.store.mark_resyncing(item.id).await?;
                        cursor.clear();
                        continue;
                    }
                    ErrorKind::UserActionRequired { .. } => {
                        self.store.mark_error(item.id, &err.to_string()).await?;
                        return Err(err);
                    }
                    // Transient failures bubble up; the queue redelivers the
                    // job without poisoning the item status.
                    _ => return Err(err),
                },
            };

            if !updates.removed.is_empty() {
                self.store
                    .mark_removed_batch(item.id, &updates.removed)
                    .await?;
            }

            let batch_size = updates.added.len() + updates.modified.len();
            if batch_size > 0 {
                let mut batch = Vec::with_capacity(batch_size);
                for tx in updates.added.iter().chain(updates.modified.iter()) {
                    let mut tx = tx.clone();
                    tx.item_id = item.id;
                    batch.push(tx);
                }

                self.store.upsert_batch(&batch).await?;
            }

            if !updates.is_empty() {
                // Event loss would leave downstream reconcilers permanently
                // behind; failing here re-runs the page instead.
                self.publisher
                    .publish_sync_events(
                        item.id,
                        updates.added.len(),
                        updates.modified.len(),
                        updates.removed.len(),
                    )
                    .await?;
            }

            // Cursor checkpoint: only after the page is durably persisted
            // and announced.
            self.store
                .update_success(item.id, &updates.next_cursor)
                .await?;

            debug!(
                item_id = %item.id,
                added = updates.added.len(),
                modified = updates.modified.len(),
                removed = updates.removed.len(),
                has_more = updates.has_more,
                "sync page persisted"
            );

            if !updates.has_more {
                break;
            }
            cursor = updates.next_cursor;
        }

        Ok(())
    }
}
