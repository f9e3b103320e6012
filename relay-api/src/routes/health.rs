use actix_web::{HttpResponse, Responder, get};

/// Liveness probe.
#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().finish()
}
