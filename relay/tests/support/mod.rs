use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use relay::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown};
use relay::events::MemoryEventPublisher;
use relay::limiter::MemoryRateLimiter;
use relay::lock::MemorySyncLock;
use relay::provider::MemoryProviderClient;
use relay::store::MemoryStore;
use relay::sync::Syncer;
use relay::types::{Item, SyncUpdates, Transaction, TransactionStatus};
use std::time::Duration;

pub type TestSyncer = Syncer<
    MemoryStore,
    MemoryProviderClient,
    MemorySyncLock,
    MemoryEventPublisher,
    MemoryRateLimiter,
>;

/// Everything a sync scenario needs: the orchestrator wired against
/// in-memory fakes, plus handles on the fakes for scripting and assertions.
pub struct TestRelay {
    pub store: MemoryStore,
    pub provider: MemoryProviderClient,
    pub lock: MemorySyncLock,
    pub publisher: MemoryEventPublisher,
    pub syncer: TestSyncer,
    pub shutdown_rx: ShutdownRx,
    // Held so shutdown receivers keep observing a live channel.
    _shutdown_tx: ShutdownTx,
}

impl TestRelay {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let provider = MemoryProviderClient::new();
        let lock = MemorySyncLock::new();
        let publisher = MemoryEventPublisher::new();
        let (shutdown_tx, shutdown_rx) = create_shutdown();

        let syncer = Syncer::new(
            store.clone(),
            provider.clone(),
            lock.clone(),
            publisher.clone(),
            // Generous budgets; limiter behavior has its own tests.
            MemoryRateLimiter::new(10_000, Duration::from_secs(60)),
            MemoryRateLimiter::new(10_000, Duration::from_secs(60)),
        );

        Self {
            store,
            provider,
            lock,
            publisher,
            syncer,
            shutdown_rx,
            _shutdown_tx: shutdown_tx,
        }
    }

    /// Creates and stores an item ready to sync from an empty cursor.
    pub async fn linked_item(&self) -> Item {
        let item = Item::new(Uuid::new_v4(), "provider-item-1", "access-token");
        relay::store::ItemStore::create(&self.store, &item)
            .await
            .expect("create item");
        item
    }
}

/// A transaction as the provider hands it over: not yet stamped with the
/// owning item id.
pub fn provider_transaction(provider_id: &str, amount_cents: i64) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: Uuid::new_v4(),
        item_id: Uuid::nil(),
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

/// Builds one sync page.
pub fn page(
    added: Vec<Transaction>,
    removed: Vec<&str>,
    next_cursor: &str,
    has_more: bool,
) -> SyncUpdates {
    SyncUpdates {
        added,
        modified: Vec::new(),
        removed: removed.into_iter().map(str::to_string).collect(),
        next_cursor: next_cursor.to_string(),
        has_more,
    }
}
