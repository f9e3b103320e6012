use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::provider::{ProviderClient, SYNC_PAGE_SIZE, classify_error_code};
use crate::types::{SyncUpdates, TokenExchange, Transaction, TransactionStatus};

/// Upstream API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEnvironment {
    Sandbox,
    Development,
    Production,
}

impl From<relay_config::ProviderEnv> for ProviderEnvironment {
    fn from(env: relay_config::ProviderEnv) -> Self {
        match env {
            relay_config::ProviderEnv::Sandbox => ProviderEnvironment::Sandbox,
            relay_config::ProviderEnv::Development => ProviderEnvironment::Development,
            relay_config::ProviderEnv::Production => ProviderEnvironment::Production,
        }
    }
}

impl ProviderEnvironment {
    /// Base URL of the provider API for this environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderEnvironment::Sandbox => "https://sandbox.plaid.com",
            ProviderEnvironment::Development => "https://development.plaid.com",
            ProviderEnvironment::Production => "https://production.plaid.com",
        }
    }
}

/// HTTP client for the upstream provider.
///
/// Credentials ride in every request body, as the provider's API expects.
/// Responses with an error status are decoded into the provider's error
/// shape and classified through [`classify_error_code`]; everything the
/// mapping does not recognize, including transport and decoding failures, is
/// treated as transient.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    secret: String,
}

impl HttpProviderClient {
    pub fn new(
        environment: ProviderEnvironment,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self::with_base_url(environment.base_url(), client_id, secret)
    }

    /// Builds a client against an explicit base URL; used by tests to point
    /// at a mock server.
    pub fn with_base_url(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            secret: secret.into(),
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> RelayResult<R>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::ProviderTransport, err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(error) = serde_json::from_str::<WireError>(&body) {
                return Err(RelayError::with_source(
                    classify_error_code(&error.error_code),
                    format!("provider returned {status}: {}", error.error_message),
                ));
            }

            return Err(RelayError::with_source(
                ErrorKind::ProviderTransport,
                format!("provider returned {status}"),
            ));
        }

        response
            .json::<R>()
            .await
            .map_err(|err| RelayError::with_source(ErrorKind::ProviderDecodeFailed, err))
    }
}

impl ProviderClient for HttpProviderClient {
    async fn fetch_sync_updates(&self, access_token: &str, cursor: &str) -> RelayResult<SyncUpdates> {
        let request = SyncRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            access_token,
            cursor: (!cursor.is_empty()).then_some(cursor),
            count: SYNC_PAGE_SIZE,
        };

        let response: SyncResponse = self.post_json("/transactions/sync", &request).await?;

        let mut added = Vec::with_capacity(response.added.len());
        for wire in &response.added {
            added.push(map_transaction(wire)?);
        }
        let mut modified = Vec::with_capacity(response.modified.len());
        for wire in &response.modified {
            modified.push(map_transaction(wire)?);
        }
        let removed = response
            .removed
            .into_iter()
            .map(|entry| entry.transaction_id)
            .collect();

        Ok(SyncUpdates {
            added,
            modified,
            removed,
            next_cursor: response.next_cursor,
            has_more: response.has_more,
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> RelayResult<TokenExchange> {
        let request = ExchangeRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            public_token,
        };

        let response: ExchangeResponse = self
            .post_json("/item/public_token/exchange", &request)
            .await?;

        Ok(TokenExchange {
            access_token: response.access_token,
            provider_item_id: response.item_id,
        })
    }

    async fn create_link_token(&self, user_id: &str) -> RelayResult<String> {
        let request = LinkTokenRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            client_name: "sync-relay",
            language: "en",
            country_codes: &["US"],
            products: &["transactions"],
            user: LinkTokenUser {
                client_user_id: user_id,
            },
        };

        let response: LinkTokenResponse = self.post_json("/link/token/create", &request).await?;

        Ok(response.link_token)
    }
}

/// Converts one wire transaction into its domain shape.
///
/// Amounts arrive as floating-point units and are stored as integer cents,
/// rounded half away from zero. The merchant display name falls back to the
/// generic name field when the merchant field is absent or empty.
fn map_transaction(wire: &WireTransaction) -> RelayResult<Transaction> {
    let date = NaiveDate::parse_from_str(&wire.date, "%Y-%m-%d")
        .map_err(|_| RelayError::data_conversion("date", wire.date.clone()))?;

    let amount_cents = (wire.amount * 100.0).round() as i64;

    let currency_code = wire
        .iso_currency_code
        .clone()
        .unwrap_or_else(|| "USD".to_string());

    let merchant_name = match &wire.merchant_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => wire.name.clone(),
    };

    let status = if wire.pending {
        TransactionStatus::Pending
    } else {
        TransactionStatus::Posted
    };

    let raw_payload = serde_json::to_value(wire)?;

    let now = chrono::Utc::now();
    Ok(Transaction {
        id: Uuid::new_v4(),
        // Stamped by the orchestrator once the owning item is known.
        item_id: Uuid::nil(),
        provider_transaction_id: wire.transaction_id.clone(),
        provider_pending_id: wire.pending_transaction_id.clone(),
        amount_cents,
        currency_code,
        date,
        merchant_name,
        status,
        is_removed: false,
        raw_payload,
        created_at: now,
        updated_at: now,
    })
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    count: u32,
}

#[derive(Deserialize)]
struct SyncResponse {
    #[serde(default)]
    added: Vec<WireTransaction>,
    #[serde(default)]
    modified: Vec<WireTransaction>,
    #[serde(default)]
    removed: Vec<WireRemovedTransaction>,
    next_cursor: String,
    has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireTransaction {
    transaction_id: String,
    #[serde(default)]
    pending_transaction_id: Option<String>,
    amount: f64,
    #[serde(default)]
    iso_currency_code: Option<String>,
    date: String,
    #[serde(default)]
    merchant_name: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    pending: bool,
}

#[derive(Deserialize)]
struct WireRemovedTransaction {
    transaction_id: String,
}

#[derive(Deserialize)]
struct WireError {
    error_code: String,
    #[serde(default)]
    error_message: String,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    public_token: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Serialize)]
struct LinkTokenRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    client_name: &'a str,
    language: &'a str,
    country_codes: &'a [&'a str],
    products: &'a [&'a str],
    user: LinkTokenUser<'a>,
}

#[derive(Serialize)]
struct LinkTokenUser<'a> {
    client_user_id: &'a str,
}

#[derive(Deserialize)]
struct LinkTokenResponse {
    link_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(amount: f64) -> WireTransaction {
        WireTransaction {
            transaction_id: "tx-1".to_string(),
            pending_transaction_id: None,
            amount,
            iso_currency_code: None,
            date: "2024-03-01".to_string(),
            merchant_name: None,
            name: "COFFEE CORNER #42".to_string(),
            pending: false,
        }
    }

    #[test]
    fn amounts_round_half_away_from_zero_to_cents() {
        assert_eq!(map_transaction(&wire(12.345)).unwrap().amount_cents, 1235);
        assert_eq!(map_transaction(&wire(12.344)).unwrap().amount_cents, 1234);
        assert_eq!(map_transaction(&wire(-0.005)).unwrap().amount_cents, -1);
        assert_eq!(map_transaction(&wire(0.0)).unwrap().amount_cents, 0);
    }

    #[test]
    fn currency_defaults_to_usd() {
        let tx = map_transaction(&wire(1.0)).unwrap();
        assert_eq!(tx.currency_code, "USD");

        let mut eur = wire(1.0);
        eur.iso_currency_code = Some("EUR".to_string());
        assert_eq!(map_transaction(&eur).unwrap().currency_code, "EUR");
    }

    #[test]
    fn merchant_name_falls_back_to_generic_name() {
        let tx = map_transaction(&wire(1.0)).unwrap();
        assert_eq!(tx.merchant_name, "COFFEE CORNER #42");

        let mut named = wire(1.0);
        named.merchant_name = Some("Coffee Corner".to_string());
        assert_eq!(map_transaction(&named).unwrap().merchant_name, "Coffee Corner");

        // An empty merchant field also falls back.
        let mut empty = wire(1.0);
        empty.merchant_name = Some(String::new());
        assert_eq!(
            map_transaction(&empty).unwrap().merchant_name,
            "COFFEE CORNER #42"
        );
    }

    #[test]
    fn invalid_dates_are_conversion_errors() {
        let mut bad = wire(1.0);
        bad.date = "03/01/2024".to_string();

        let err = map_transaction(&bad).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::DataConversionFailed { field, .. } if field == "date"
        ));
    }

    #[test]
    fn pending_flag_maps_to_status() {
        let mut pending = wire(1.0);
        pending.pending = true;
        assert_eq!(
            map_transaction(&pending).unwrap().status,
            TransactionStatus::Pending
        );
        assert_eq!(
            map_transaction(&wire(1.0)).unwrap().status,
            TransactionStatus::Posted
        );
    }
}
