//! End-to-end sync scenarios against the in-memory fakes.

mod support;

use relay::error::ErrorKind;
use relay::lock::{LockGuard, SyncLock, lock_key};
use relay::store::ItemStore;
use relay::types::SyncStatus;
use std::time::Duration;
use support::{TestRelay, page, provider_transaction};

#[tokio::test]
async fn single_page_sync_persists_rows_and_checkpoints_cursor() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay
        .provider
        .script_page(page(
            vec![
                provider_transaction("tx-1", 1250),
                provider_transaction("tx-2", -300),
            ],
            vec![],
            "C1",
            false,
        ))
        .await;

    let mut shutdown = relay.shutdown_rx.clone();
    relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();

    let rows = relay.store.transactions_for_item(item.id).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|tx| !tx.is_removed));

    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.next_cursor, "C1");
    assert_eq!(stored.sync_status, SyncStatus::Active);
    assert!(stored.last_synced_at.is_some());

    let events = relay.publisher.published().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].counts.added, 2);
    assert_eq!(events[0].counts.modified, 0);
    assert_eq!(events[0].counts.removed, 0);
}

#[tokio::test]
async fn multi_page_sync_checkpoints_every_page() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay
        .provider
        .script_page(page(
            vec![provider_transaction("tx-1", 100)],
            vec![],
            "C1",
            true,
        ))
        .await;
    relay
        .provider
        .script_page(page(
            vec![provider_transaction("tx-2", 200)],
            vec![],
            "C2",
            false,
        ))
        .await;

    let mut shutdown = relay.shutdown_rx.clone();
    relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();

    // The second fetch must present the cursor checkpointed by the first.
    assert_eq!(relay.provider.cursors_seen().await, vec!["", "C1"]);

    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.next_cursor, "C2");

    assert_eq!(relay.store.transactions_for_item(item.id).await.len(), 2);
    assert_eq!(relay.publisher.published().await.len(), 2);
}

#[tokio::test]
async fn cursor_reset_restarts_from_empty_cursor() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    // Give the item a cursor so the restart is observable.
    relay.store.update_success(item.id, "stale").await.unwrap();

    relay.provider.script_error(ErrorKind::CursorReset).await;
    relay
        .provider
        .script_page(page(
            vec![provider_transaction("tx-1", 100)],
            vec![],
            "Cx",
            false,
        ))
        .await;

    let mut shutdown = relay.shutdown_rx.clone();
    relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();

    // First fetch with the stale cursor, the retry from the beginning.
    assert_eq!(relay.provider.cursors_seen().await, vec!["stale", ""]);

    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Active);
    assert_eq!(stored.next_cursor, "Cx");
    assert_eq!(relay.store.transactions_for_item(item.id).await.len(), 1);
}

#[tokio::test]
async fn cursor_reset_then_transient_failure_leaves_item_resyncing() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay.provider.script_error(ErrorKind::CursorReset).await;
    relay.provider.script_error(ErrorKind::ProviderTransport).await;

    let mut shutdown = relay.shutdown_rx.clone();
    let err = relay
        .syncer
        .sync_item(item.id, &mut shutdown)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // The resyncing transition survived; redelivery will replay from "".
    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Resyncing);
}

#[tokio::test]
async fn user_action_required_marks_item_error_and_stops() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay
        .provider
        .script_error(ErrorKind::UserActionRequired {
            code: "ITEM_LOGIN_REQUIRED".to_string(),
        })
        .await;

    let mut shutdown = relay.shutdown_rx.clone();
    let err = relay
        .syncer
        .sync_item(item.id, &mut shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UserActionRequired { .. }));

    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Error);
    assert!(stored.error_message.as_deref().is_some_and(|m| !m.is_empty()));

    assert!(relay.store.transactions_for_item(item.id).await.is_empty());
    assert!(relay.publisher.published().await.is_empty());
}

#[tokio::test]
async fn held_lock_drops_the_duplicate_job() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    let guard = relay
        .lock
        .acquire(&lock_key(item.id), Duration::from_secs(60))
        .await
        .unwrap();

    let mut shutdown = relay.shutdown_rx.clone();
    let err = relay
        .syncer
        .sync_item(item.id, &mut shutdown)
        .await
        .unwrap_err();
    assert!(err.is_lock_busy());

    // Nothing was written and the item status is untouched.
    assert!(relay.store.transactions_for_item(item.id).await.is_empty());
    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Active);

    guard.release().await.unwrap();
}

#[tokio::test]
async fn duplicate_webhook_without_upstream_changes_writes_nothing_new() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay
        .provider
        .script_page(page(
            vec![
                provider_transaction("tx-1", 1250),
                provider_transaction("tx-2", -300),
            ],
            vec![],
            "C1",
            false,
        ))
        .await;
    // The duplicate job syncs from "C1" and the upstream has nothing new.
    relay.provider.script_page(page(vec![], vec![], "C1", false)).await;

    let mut shutdown = relay.shutdown_rx.clone();
    relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();
    relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();

    assert_eq!(relay.provider.cursors_seen().await, vec!["", "C1"]);
    assert_eq!(relay.store.transactions_for_item(item.id).await.len(), 2);
    // The empty page published no event.
    assert_eq!(relay.publisher.published().await.len(), 1);
}

#[tokio::test]
async fn removed_transaction_reappears_untombstoned_with_new_values() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay
        .provider
        .script_page(page(
            vec![provider_transaction("tx-1", 1000)],
            vec![],
            "C1",
            false,
        ))
        .await;
    relay
        .provider
        .script_page(page(vec![], vec!["tx-1"], "C2", false))
        .await;
    relay
        .provider
        .script_page(page(
            vec![provider_transaction("tx-1", 1400)],
            vec![],
            "C3",
            false,
        ))
        .await;

    let mut shutdown = relay.shutdown_rx.clone();
    for _ in 0..3 {
        relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();
    }

    let row = relay.store.transaction("tx-1").await.unwrap();
    assert!(!row.is_removed);
    assert_eq!(row.amount_cents, 1400);

    let events = relay.publisher.published().await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].counts.removed, 1);
}

#[tokio::test]
async fn publish_failure_aborts_before_the_cursor_checkpoint() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;

    relay
        .provider
        .script_page(page(
            vec![
                provider_transaction("tx-1", 1250),
                provider_transaction("tx-2", -300),
            ],
            vec![],
            "C1",
            false,
        ))
        .await;
    relay.publisher.fail_publishes(true);

    let mut shutdown = relay.shutdown_rx.clone();
    let err = relay
        .syncer
        .sync_item(item.id, &mut shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::EventPublishFailed));

    // Rows were written but the cursor did not advance.
    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.next_cursor, "");

    // Redelivery replays the same page; the upsert absorbs the duplicates.
    relay.publisher.fail_publishes(false);
    relay
        .provider
        .script_page(page(
            vec![
                provider_transaction("tx-1", 1250),
                provider_transaction("tx-2", -300),
            ],
            vec![],
            "C1",
            false,
        ))
        .await;

    relay.syncer.sync_item(item.id, &mut shutdown).await.unwrap();

    assert_eq!(relay.store.transactions_for_item(item.id).await.len(), 2);
    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.next_cursor, "C1");
}

#[tokio::test]
async fn items_in_error_status_refuse_to_sync_without_overwriting_state() {
    let relay = TestRelay::new();
    let item = relay.linked_item().await;
    relay.store.mark_error(item.id, "login required").await.unwrap();

    let mut shutdown = relay.shutdown_rx.clone();
    let err = relay
        .syncer
        .sync_item(item.id, &mut shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ItemNotSyncable { .. }));

    let stored = relay.store.get_by_id(item.id).await.unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Error);
    assert_eq!(stored.error_message.as_deref(), Some("login required"));
}
