use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{ErrorKind, RelayError, RelayResult};
use crate::provider::ProviderClient;
use crate::types::{SyncUpdates, TokenExchange};

/// One scripted response for a `fetch_sync_updates` call.
#[derive(Debug, Clone)]
pub enum ScriptedFetch {
    Updates(SyncUpdates),
    Error(ErrorKind),
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<ScriptedFetch>,
    /// Cursor of every fetch, in call order.
    cursors_seen: Vec<String>,
}

/// Scripted provider client for tests.
///
/// Responses are played back in the order they were scripted; the cursors
/// the orchestrator presented are recorded for assertions. An exhausted
/// script fails the call, which keeps misconfigured tests from looping.
#[derive(Debug, Clone, Default)]
pub struct MemoryProviderClient {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successful page to the script.
    pub async fn script_page(&self, updates: SyncUpdates) {
        self.inner
            .lock()
            .await
            .script
            .push_back(ScriptedFetch::Updates(updates));
    }

    /// Appends a failing fetch to the script.
    pub async fn script_error(&self, kind: ErrorKind) {
        self.inner
            .lock()
            .await
            .script
            .push_back(ScriptedFetch::Error(kind));
    }

    /// Returns the cursors presented by the orchestrator, in call order.
    pub async fn cursors_seen(&self) -> Vec<String> {
        self.inner.lock().await.cursors_seen.clone()
    }
}

impl ProviderClient for MemoryProviderClient {
    async fn fetch_sync_updates(&self, _access_token: &str, cursor: &str) -> RelayResult<SyncUpdates> {
        let mut inner = self.inner.lock().await;
        inner.cursors_seen.push(cursor.to_string());

        match inner.script.pop_front() {
            Some(ScriptedFetch::Updates(updates)) => Ok(updates),
            Some(ScriptedFetch::Error(kind)) => Err(RelayError::new(kind)),
            None => Err(RelayError::with_source(
                ErrorKind::ProviderTransport,
                "scripted provider exhausted",
            )),
        }
    }

    async fn exchange_public_token(&self, public_token: &str) -> RelayResult<TokenExchange> {
        Ok(TokenExchange {
            access_token: format!("access-{public_token}"),
            provider_item_id: format!("item-{public_token}"),
        })
    }

    async fn create_link_token(&self, user_id: &str) -> RelayResult<String> {
        Ok(format!("link-{user_id}"))
    }
}
