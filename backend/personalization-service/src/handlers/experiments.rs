/// Experiments API handlers - A/B testing endpoints
use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{ExperimentDefinition, ExperimentEvent, ExperimentEventType};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// POST /api/v1/experiments - Create new experiment
#[tracing::instrument(skip(state, req), fields(experiment_id = %req.id))]
pub async fn create_experiment(
    state: web::Data<AppState>,
    req: web::Json<ExperimentDefinition>,
) -> Result<HttpResponse> {
    let experiment = state.engine.create_experiment(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(experiment))
}

/// GET /api/v1/experiments/active - Experiments currently accepting traffic
#[tracing::instrument(skip(state))]
pub async fn get_active_experiments(state: web::Data<AppState>) -> Result<HttpResponse> {
    let experiments = state.engine.get_active_experiments().await?;
    Ok(HttpResponse::Ok().json(experiments))
}

/// POST /api/v1/experiments/{id}/start - Start experiment
#[tracing::instrument(skip(state))]
pub async fn start_experiment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let experiment = state.engine.start_experiment(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(experiment))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConcludeExperimentRequest {
    #[serde(default)]
    pub winning_variant_id: Option<String>,
}

/// POST /api/v1/experiments/{id}/conclude - Conclude experiment
#[tracing::instrument(skip(state, req))]
pub async fn conclude_experiment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: Option<web::Json<ConcludeExperimentRequest>>,
) -> Result<HttpResponse> {
    let winning_variant_id = req.map(|r| r.into_inner()).unwrap_or_default().winning_variant_id;
    let experiment = state
        .engine
        .conclude_experiment(&path.into_inner(), winning_variant_id)
        .await?;
    Ok(HttpResponse::Ok().json(experiment))
}

#[derive(Debug, Deserialize)]
pub struct TrackEventRequest {
    pub variant_id: String,
    pub user_id: String,
    pub event_type: ExperimentEventType,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// POST /api/v1/experiments/{id}/events - Track experiment event
#[tracing::instrument(skip(state, req))]
pub async fn track_event(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<TrackEventRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    if req.user_id.trim().is_empty() {
        return Err(AppError::ValidationError(
            "user_id cannot be empty".to_string(),
        ));
    }

    let event = ExperimentEvent {
        id: Uuid::new_v4(),
        experiment_id: path.into_inner(),
        variant_id: req.variant_id,
        user_id: req.user_id,
        event_type: req.event_type,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
        metadata: req.metadata,
    };
    let event_id = event.id;

    state.engine.track_experiment_event(event).await?;

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "event_id": event_id
    })))
}

/// GET /api/v1/experiments/{id}/results - Per-variant results and significance
#[tracing::instrument(skip(state))]
pub async fn get_results(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let results = state
        .engine
        .get_experiment_results(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(results))
}

/// GET /api/v1/experiments/assignments/{user_id} - Current assignment
#[tracing::instrument(skip(state))]
pub async fn get_assignment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    match state.engine.get_user_experiment_assignment(&user_id).await? {
        Some(assignment) => Ok(HttpResponse::Ok().json(assignment)),
        None => Err(AppError::NotFound(format!(
            "No active assignment for user {}",
            user_id
        ))),
    }
}

/// Configure experiment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/experiments")
            .route("", web::post().to(create_experiment))
            .route("/active", web::get().to(get_active_experiments))
            .route("/assignments/{user_id}", web::get().to(get_assignment))
            .route("/{id}/start", web::post().to(start_experiment))
            .route("/{id}/conclude", web::post().to(conclude_experiment))
            .route("/{id}/events", web::post().to(track_event))
            .route("/{id}/results", web::get().to(get_results)),
    );
}
