pub mod health;
pub mod link;
pub mod webhooks;

use serde::Serialize;

/// Error body returned by API routes.
#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}
