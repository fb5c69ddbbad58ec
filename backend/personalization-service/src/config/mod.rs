use crate::services::recommendation::RecommendationConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub recommendation: RecommendationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub service_name: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSettings {
    pub recommendation_count: usize,
    pub enable_ab_testing: bool,
    /// Confidence (percent) at which a variant counts as significant
    pub significance_threshold: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    /// Load from the process environment, after applying `.env` if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            app: AppConfig {
                env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
                service_name: lookup("SERVICE_NAME")
                    .unwrap_or_else(|| "personalization-service".to_string()),
                port: parse_or(&lookup, "HTTP_PORT", 8020)?,
            },
            recommendation: RecommendationSettings {
                recommendation_count: parse_or(&lookup, "RECOMMENDATION_COUNT", 6)?,
                enable_ab_testing: parse_or(&lookup, "ENABLE_AB_TESTING", true)?,
                significance_threshold: parse_or(&lookup, "SIGNIFICANCE_THRESHOLD", 95.0)?,
            },
        };

        if config.recommendation.recommendation_count == 0 {
            return Err(ConfigError::Invalid {
                key: "RECOMMENDATION_COUNT",
                value: "0".to_string(),
            });
        }

        let threshold = config.recommendation.significance_threshold;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ConfigError::Invalid {
                key: "SIGNIFICANCE_THRESHOLD",
                value: threshold.to_string(),
            });
        }

        Ok(config)
    }

    pub fn engine_config(&self) -> RecommendationConfig {
        RecommendationConfig {
            default_count: self.recommendation.recommendation_count,
            enable_ab_testing: self.recommendation.enable_ab_testing,
            significance_threshold: self.recommendation.significance_threshold,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
