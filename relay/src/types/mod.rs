//! Domain types for the sync relay.
//!
//! An [`Item`] is one connection between a tenant and the upstream provider
//! and is the aggregate root for its [`Transaction`] rows. [`SyncJob`] is the
//! ephemeral work unit carried by the job queue, and [`WebhookPayload`] /
//! [`SyncUpdates`] are the transport shapes exchanged with the provider.

mod item;
mod job;
mod transaction;
mod webhook;

pub use item::{Item, SyncStatus};
pub use job::{SyncJob, SyncJobType};
pub use transaction::{Transaction, TransactionStatus};
pub use webhook::{WebhookError, WebhookPayload};

/// One page of incremental sync results from the upstream provider.
///
/// `removed` carries provider transaction ids only; the upstream does not
/// resend full rows for deletions.
#[derive(Debug, Clone, Default)]
pub struct SyncUpdates {
    pub added: Vec<Transaction>,
    pub modified: Vec<Transaction>,
    pub removed: Vec<String>,
    pub next_cursor: String,
    pub has_more: bool,
}

impl SyncUpdates {
    /// Returns true when this page carries no additions, modifications or
    /// removals.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Result of exchanging a link-flow public token for a permanent access token.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    pub access_token: String,
    pub provider_item_id: String,
}
