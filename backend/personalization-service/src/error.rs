/// Error types for Personalization Service
///
/// Service errors are converted to HTTP responses with a JSON body
/// `{ "error", "message", "status" }`.
use crate::db::StoreError;
use crate::services::experiments::{AssignmentError, ExperimentError};
use crate::services::recommendation::RecommendationError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::fmt;

/// Result type for HTTP handlers
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Validation failed
    ValidationError(String),

    /// Resource not found
    NotFound(String),

    /// Conflict (duplicate resource)
    Conflict(String),

    /// Illegal lifecycle transition
    InvalidTransition(String),

    /// Store operation failed
    StoreError(String),

    /// Internal server error
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InvalidTransition(msg) => write!(f, "Invalid state transition: {}", msg),
            AppError::StoreError(msg) => write!(f, "Store error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Conflict(_) => "conflict_error",
            AppError::InvalidTransition(_) => "invalid_state_transition",
            AppError::StoreError(_) | AppError::Internal(_) => "server_error",
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Backend(msg) => AppError::StoreError(msg),
        }
    }
}

impl From<ExperimentError> for AppError {
    fn from(err: ExperimentError) -> Self {
        match err {
            ExperimentError::NotFound(_) | ExperimentError::VariantNotFound { .. } => {
                AppError::NotFound(err.to_string())
            }
            ExperimentError::DuplicateId(_) => AppError::Conflict(err.to_string()),
            ExperimentError::InvalidStateTransition { .. } => {
                AppError::InvalidTransition(err.to_string())
            }
            ExperimentError::Validation(msg) => AppError::ValidationError(msg),
            ExperimentError::Store(e) => e.into(),
        }
    }
}

impl From<AssignmentError> for AppError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::Store(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<RecommendationError> for AppError {
    fn from(err: RecommendationError) -> Self {
        match err {
            RecommendationError::InvalidProfile(msg) | RecommendationError::InvalidFeedback(msg) => {
                AppError::ValidationError(msg)
            }
            RecommendationError::Experiment(e) => e.into(),
            RecommendationError::Assignment(e) => e.into(),
            RecommendationError::Store(e) => e.into(),
        }
    }
}
