/// Recommendation API handlers
use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{
    RecommendationContext, RecommendationFeedback, UserBehavior, UserProfile, MAX_RATING,
};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GenerateRecommendationsRequest {
    pub profile: UserProfile,
    #[serde(default)]
    pub context: Option<RecommendationContext>,
}

/// POST /api/v1/recommendations - Ranked recommendations for a visitor
#[tracing::instrument(skip(state, req), fields(user_id = %req.profile.id))]
pub async fn generate_recommendations(
    state: web::Data<AppState>,
    req: web::Json<GenerateRecommendationsRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let batch = state
        .engine
        .generate_with_context(&req.profile, req.context)
        .await;

    Ok(HttpResponse::Ok().json(batch))
}

/// POST /api/v1/recommendations/feedback - Record visitor feedback
#[tracing::instrument(skip(state, req), fields(recommendation_id = %req.recommendation_id))]
pub async fn record_feedback(
    state: web::Data<AppState>,
    req: web::Json<RecommendationFeedback>,
) -> Result<HttpResponse> {
    let feedback = req.into_inner();
    if !feedback.has_valid_rating() {
        return Err(AppError::ValidationError(format!(
            "rating must be between 0 and {}, got {}",
            MAX_RATING, feedback.rating
        )));
    }

    state.engine.record_feedback(feedback).await;

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "status": "accepted"
    })))
}

/// GET /api/v1/recommendations/metrics - Feedback performance
#[tracing::instrument(skip(state))]
pub async fn get_metrics(state: web::Data<AppState>) -> Result<HttpResponse> {
    let metrics = state.engine.get_metrics().await?;
    Ok(HttpResponse::Ok().json(metrics))
}

/// POST /api/v1/profiles/{user_id}/behavior - Append to a visitor's history
#[tracing::instrument(skip(state, req))]
pub async fn track_behavior(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<UserBehavior>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let recorded = state
        .engine
        .track_user_behavior(&user_id, req.into_inner())
        .await;

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "user_id": user_id,
        "recorded": recorded
    })))
}

/// Configure recommendation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/recommendations")
            .route("", web::post().to(generate_recommendations))
            .route("/feedback", web::post().to(record_feedback))
            .route("/metrics", web::get().to(get_metrics)),
    )
    .service(
        web::scope("/api/v1/profiles")
            .route("/{user_id}/behavior", web::post().to(track_behavior)),
    );
}
