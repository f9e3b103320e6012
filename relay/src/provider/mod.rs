//! Upstream provider port.
//!
//! The provider exposes a cursor-based incremental sync endpoint plus the
//! link-time token exchange. The HTTP adapter maps the provider's error
//! codes onto the relay's error kinds; that mapping is the contract the
//! orchestrator's failure handling is built on.

mod http;
mod memory;

pub use http::{HttpProviderClient, ProviderEnvironment};
pub use memory::{MemoryProviderClient, ScriptedFetch};

use std::future::Future;

use crate::error::{ErrorKind, RelayResult};
use crate::types::{SyncUpdates, TokenExchange};

/// Number of transactions requested per sync page.
pub const SYNC_PAGE_SIZE: u32 = 500;

/// Provider error code demanding a cursor reset.
pub const CODE_MUTATION_LIMIT_EXCEEDED: &str = "TRANSACTIONS_SYNC_MUTATION_LIMIT_EXCEEDED";

/// Provider error codes that require end-user intervention before the item
/// can sync again.
pub const USER_ACTION_CODES: &[&str] = &[
    "ITEM_LOGIN_REQUIRED",
    "ITEM_LOCKED",
    "USER_SETUP_REQUIRED",
    "INVALID_ACCESS_TOKEN",
    "ITEM_NOT_FOUND",
];

/// Classifies a provider error code into an error kind.
///
/// Anything unrecognized is transient: the job fails and the queue
/// redelivers it.
pub fn classify_error_code(code: &str) -> ErrorKind {
    if code == CODE_MUTATION_LIMIT_EXCEEDED {
        return ErrorKind::CursorReset;
    }
    if USER_ACTION_CODES.contains(&code) {
        return ErrorKind::UserActionRequired {
            code: code.to_string(),
        };
    }

    ErrorKind::ProviderTransport
}

/// Trait for the upstream provider operations the relay depends on.
pub trait ProviderClient {
    /// Fetches one page of incremental updates for the given cursor.
    ///
    /// An empty cursor asks for the full history from the beginning.
    fn fetch_sync_updates(
        &self,
        access_token: &str,
        cursor: &str,
    ) -> impl Future<Output = RelayResult<SyncUpdates>> + Send;

    /// Exchanges a link-flow public token for a permanent access token.
    fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> impl Future<Output = RelayResult<TokenExchange>> + Send;

    /// Creates a link token to start the link flow for a user.
    fn create_link_token(
        &self,
        user_id: &str,
    ) -> impl Future<Output = RelayResult<String>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_limit_maps_to_cursor_reset() {
        assert_eq!(
            classify_error_code("TRANSACTIONS_SYNC_MUTATION_LIMIT_EXCEEDED"),
            ErrorKind::CursorReset
        );
    }

    #[test]
    fn user_action_codes_map_to_user_action_required() {
        for code in USER_ACTION_CODES {
            match classify_error_code(code) {
                ErrorKind::UserActionRequired { code: mapped } => assert_eq!(&mapped, code),
                other => panic!("{code} mapped to {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_codes_are_transient() {
        assert_eq!(
            classify_error_code("RATE_LIMIT_EXCEEDED"),
            ErrorKind::ProviderTransport
        );
    }
}
