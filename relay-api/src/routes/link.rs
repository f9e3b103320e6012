use actix_web::http::{StatusCode, header::ContentType};
use actix_web::{HttpResponse, Responder, ResponseError, post, web::Data, web::Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use relay::error::{ErrorKind, RelayError};
use relay::provider::{HttpProviderClient, ProviderClient};
use relay::queue::{JobQueue, RedisJobQueue};
use relay::store::{ItemStore, PostgresStore};
use relay::types::{Item, SyncJob};

use crate::routes::ErrorMessage;

/// Demo tenant until end-user authentication lands; link requests are not
/// authenticated yet.
const DEMO_TENANT_ID: Uuid = Uuid::from_u128(1);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("the public token is invalid or was already used")]
    InvalidPublicToken,

    #[error("public_token is required")]
    MissingPublicToken,

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl LinkError {
    pub fn to_message(&self) -> String {
        match self {
            // Do not expose provider or database details in error messages.
            LinkError::Relay(_) => "internal server error".to_string(),
            e => e.to_string(),
        }
    }
}

impl ResponseError for LinkError {
    fn status_code(&self) -> StatusCode {
        match self {
            LinkError::InvalidPublicToken => StatusCode::CONFLICT,
            LinkError::MissingPublicToken => StatusCode::BAD_REQUEST,
            LinkError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = ErrorMessage {
            error: self.to_message(),
        };
        let body =
            serde_json::to_string(&error_message).expect("failed to serialize error message");
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(body)
    }
}

#[derive(Debug, Serialize)]
pub struct CreateLinkTokenResponse {
    pub link_token: String,
}

/// Issues a link token to start the provider's link flow.
#[post("/api/link/token")]
pub async fn create_link_token(
    provider: Data<HttpProviderClient>,
) -> Result<impl Responder, LinkError> {
    let user_id = DEMO_TENANT_ID.to_string();
    let link_token = provider.create_link_token(&user_id).await?;

    Ok(Json(CreateLinkTokenResponse { link_token }))
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    #[serde(default)]
    pub public_token: String,
}

#[derive(Debug, Serialize)]
pub struct CreateItemResponse {
    pub item_id: Uuid,
    pub status: &'static str,
}

/// Completes the link flow: exchanges the public token, stores the item and
/// queues its initial sync.
///
/// Linking is idempotent: a provider item that is already linked returns the
/// existing item with `200` instead of failing.
#[post("/api/items")]
pub async fn create_item(
    request: Json<CreateItemRequest>,
    provider: Data<HttpProviderClient>,
    store: Data<PostgresStore>,
    queue: Data<RedisJobQueue>,
) -> Result<HttpResponse, LinkError> {
    let request = request.into_inner();
    if request.public_token.is_empty() {
        return Err(LinkError::MissingPublicToken);
    }

    let exchange = provider
        .exchange_public_token(&request.public_token)
        .await
        .map_err(|err| match err.kind() {
            ErrorKind::UserActionRequired { .. } => LinkError::InvalidPublicToken,
            _ => LinkError::Relay(err),
        })?;

    let item = Item::new(
        DEMO_TENANT_ID,
        &exchange.provider_item_id,
        &exchange.access_token,
    );

    match store.create(&item).await {
        Ok(()) => {}
        Err(err) if matches!(err.kind(), ErrorKind::ItemAlreadyExists { .. }) => {
            let existing = store
                .get_by_provider_item_id(&exchange.provider_item_id)
                .await?;
            info!(item_id = %existing.id, "item already linked, returning existing");

            return Ok(HttpResponse::Ok().json(CreateItemResponse {
                item_id: existing.id,
                status: "already_linked",
            }));
        }
        Err(err) => return Err(err.into()),
    }

    // The webhook-driven path covers any miss here; the initial sync just
    // arrives later.
    if let Err(err) = queue.enqueue(&SyncJob::standard(item.id)).await {
        error!(item_id = %item.id, error = %err, "failed to enqueue initial sync");
    }

    info!(item_id = %item.id, provider_item_id = %exchange.provider_item_id, "item linked");
    Ok(HttpResponse::Created().json(CreateItemResponse {
        item_id: item.id,
        status: "sync_queued",
    }))
}
