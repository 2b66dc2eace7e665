use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use tracing::error;

use crate::api::booking::BookingService;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn probe(service: &BookingService, up: &'static str, down: &'static str) -> HttpResponse {
    match service.ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: up,
            store: "connected",
            error: None,
        }),
        Err(e) => {
            error!("{} probe failed: {}", up, e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: down,
                store: "disconnected",
                error: Some(format!("Store error: {}", e)),
            })
        }
    }
}

/// General health check including store connectivity.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(service: web::Data<BookingService>) -> impl Responder {
    probe(&service, "healthy", "unhealthy").await
}

/// Readiness probe: 503 while the store is unreachable, recovers on its own.
#[get("/ready")]
async fn readiness_check(service: web::Data<BookingService>) -> impl Responder {
    probe(&service, "ready", "not_ready").await
}

/// Liveness probe. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive",
        store: "not_checked",
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
