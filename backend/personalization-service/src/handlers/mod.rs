pub mod experiments;
pub mod recommendation;

use crate::services::recommendation::RecommendationEngine;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

/// Shared handler state
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub service_name: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    version: &'static str,
}

/// GET /health - Liveness probe
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Register every route
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .configure(recommendation::configure)
        .configure(experiments::configure);
}
