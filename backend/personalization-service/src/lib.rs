//! Personalization & experimentation service for the construction website.
//!
//! Ranks project recommendations for a visitor profile (with veteran-specific
//! benefits) and runs A/B experiments over the recommendation pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::recommendation::{RecommendationConfig, RecommendationEngine};
