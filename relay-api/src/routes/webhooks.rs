use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, post, web, web::Data};
use tracing::{debug, error, info, warn};

use relay::error::ErrorKind;
use relay::queue::{JobQueue, RedisJobQueue};
use relay::store::{ItemStore, PostgresStore};
use relay::types::{SyncJob, WebhookPayload};

/// Header carrying the provider's webhook verification JWT.
const VERIFICATION_HEADER: &str = "X-Provider-Verification";

/// Inbound provider webhook.
///
/// Always acknowledges with a non-5xx status unless enqueueing itself
/// fails, so the provider retries exactly the deliveries we could not hand
/// to the queue. Filtered webhooks and unknown items return `200` without
/// revealing whether the item exists.
#[post("/webhooks/provider")]
pub async fn provider_webhook(
    request: HttpRequest,
    body: web::Bytes,
    store: Data<PostgresStore>,
    queue: Data<RedisJobQueue>,
) -> HttpResponse {
    let payload = match verify_webhook(&request, &body) {
        Ok(payload) => payload,
        Err(reason) => {
            warn!(reason, "invalid webhook attempt");
            return HttpResponse::BadRequest().finish();
        }
    };

    if !payload.is_sync_updates() {
        debug!(
            webhook_type = %payload.webhook_type,
            webhook_code = %payload.webhook_code,
            "ignoring webhook"
        );
        return HttpResponse::Ok().finish();
    }

    let item = match store.get_by_provider_item_id(&payload.provider_item_id).await {
        Ok(item) => item,
        Err(err) => {
            // Unknown items are acknowledged: a retry will not make the
            // item appear, and the response must not leak item existence.
            if matches!(err.kind(), ErrorKind::ItemNotFound { .. }) {
                debug!(provider_item_id = %payload.provider_item_id, "webhook for unknown item");
            } else {
                error!(error = %err, "item lookup failed during webhook intake");
            }
            return HttpResponse::Ok().finish();
        }
    };

    let job = SyncJob::standard(item.id);
    if let Err(err) = queue.enqueue(&job).await {
        error!(item_id = %item.id, error = %err, "failed to enqueue sync job");
        return HttpResponse::InternalServerError().finish();
    }

    info!(item_id = %item.id, trace_id = %job.trace_id, "sync job enqueued");
    HttpResponse::Accepted().finish()
}

/// Validates transport-level webhook requirements and decodes the payload.
///
/// The verification header is currently only required to be present.
/// TODO: verify the JWT against the provider's published key set.
fn verify_webhook(request: &HttpRequest, body: &[u8]) -> Result<WebhookPayload, &'static str> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("application/json") {
        return Err("invalid content type");
    }

    let verification = request
        .headers()
        .get(VERIFICATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if verification.is_empty() {
        return Err("missing verification header");
    }

    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|_| "undecodable webhook body")?;

    if payload.provider_item_id.is_empty() {
        return Err("webhook payload missing item id");
    }

    Ok(payload)
}
