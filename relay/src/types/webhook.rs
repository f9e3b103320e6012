use serde::Deserialize;

/// Webhook type emitted for transaction updates.
pub const WEBHOOK_TYPE_TRANSACTIONS: &str = "TRANSACTIONS";

/// Webhook code signalling that incremental sync updates are available.
pub const WEBHOOK_CODE_SYNC_UPDATES_AVAILABLE: &str = "SYNC_UPDATES_AVAILABLE";

/// Error block the provider attaches to some webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookError {
    pub error_code: String,
    pub error_message: String,
}

/// Transport shape of an inbound provider webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub webhook_type: String,
    pub webhook_code: String,
    /// The provider's `item_id` field carries the upstream item identifier.
    #[serde(rename = "item_id")]
    pub provider_item_id: String,
    #[serde(default)]
    pub error: Option<WebhookError>,
}

impl WebhookPayload {
    /// Returns true when this webhook should trigger a sync.
    ///
    /// Everything other than transaction sync-updates notifications is
    /// acknowledged and ignored.
    pub fn is_sync_updates(&self) -> bool {
        self.webhook_type == WEBHOOK_TYPE_TRANSACTIONS
            && self.webhook_code == WEBHOOK_CODE_SYNC_UPDATES_AVAILABLE
    }
}
