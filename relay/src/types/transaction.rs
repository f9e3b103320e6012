use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use uuid::Uuid;

/// Settlement status of a transaction as reported by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Posted,
}

impl TransactionStatus {
    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Posted => "posted",
        }
    }

    /// Parses a stored status string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "posted" => Some(TransactionStatus::Posted),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream transaction, keyed by `provider_transaction_id`.
///
/// Rows are never deleted: removals from the upstream set the `is_removed`
/// tombstone, and a later upsert of the same provider transaction id clears
/// it again. Amounts are integer cents; the float-to-cents rounding happens
/// once at the provider boundary.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Globally unique upstream identifier and the upsert key.
    pub provider_transaction_id: String,
    /// Back-reference to the pending row this posted row supersedes.
    pub provider_pending_id: Option<String>,

    pub amount_cents: i64,
    pub currency_code: String,
    /// Posting date; the upstream supplies calendar dates without a time.
    pub date: NaiveDate,
    pub merchant_name: String,
    pub status: TransactionStatus,

    /// Soft-delete tombstone; the row is retained.
    pub is_removed: bool,
    /// Raw upstream payload kept for debugging.
    pub raw_payload: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_posted(&self) -> bool {
        self.status == TransactionStatus::Posted
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}
