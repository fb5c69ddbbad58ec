// ============================================
// Experiment domain types
// ============================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Default number of recommendations returned when no variant overrides it
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 6;

/// Operator-supplied experiment definition (create request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub variants: Vec<ExperimentVariant>,
    #[serde(default = "Utc::now")]
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub target_audience: TargetAudience,
    /// Percentage of eligible visitors enrolled (0-100)
    #[serde(default = "default_sample_percent")]
    pub sample_percent: u8,
    /// Register as active right away; `false` keeps the experiment in draft
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_sample_percent() -> u8 {
    100
}

fn default_auto_start() -> bool {
    true
}

/// Experiment variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentVariant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Percentage (0-100)
    pub traffic_allocation: u8,
    #[serde(default)]
    pub is_control: bool,
    #[serde(default)]
    pub configuration: VariantConfiguration,
}

/// Variant-specific tuning consumed by the recommendation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfiguration {
    #[serde(default)]
    pub algorithm_type: AlgorithmType,
    #[serde(default)]
    pub scoring_weights: ScoringWeights,
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,
}

fn default_recommendation_count() -> usize {
    DEFAULT_RECOMMENDATION_COUNT
}

impl Default for VariantConfiguration {
    fn default() -> Self {
        Self {
            algorithm_type: AlgorithmType::default(),
            scoring_weights: ScoringWeights::default(),
            recommendation_count: DEFAULT_RECOMMENDATION_COUNT,
        }
    }
}

/// Candidate generation strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmType {
    #[default]
    Standard,
    BudgetAware,
}

/// Advisory factor weights.
///
/// Carried for reporting; the scorer combines factors by successive averaging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub budget_match: f64,
    pub behavior_history: f64,
    pub veteran_status: f64,
    pub project_similarity: f64,
    pub timeline_match: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            budget_match: 30.0,
            behavior_history: 25.0,
            veteran_status: 20.0,
            project_similarity: 15.0,
            timeline_match: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    #[default]
    All,
    VeteransOnly,
    NonVeterans,
}

/// Experiment status: draft -> active -> concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Draft,
    Active,
    Concluded,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Draft => "draft",
            ExperimentStatus::Active => "active",
            ExperimentStatus::Concluded => "concluded",
        }
    }
}

/// Registered experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub description: String,
    pub variants: Vec<ExperimentVariant>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub target_audience: TargetAudience,
    pub sample_percent: u8,
    pub status: ExperimentStatus,
    pub created_at: DateTime<Utc>,
    pub concluded_at: Option<DateTime<Utc>>,
    pub winning_variant_id: Option<String>,
}

impl Experiment {
    pub fn from_definition(definition: ExperimentDefinition, now: DateTime<Utc>) -> Self {
        let status = if definition.auto_start {
            ExperimentStatus::Active
        } else {
            ExperimentStatus::Draft
        };

        Self {
            id: definition.id,
            name: definition.name,
            description: definition.description,
            variants: definition.variants,
            start_date: definition.start_date,
            end_date: definition.end_date,
            target_audience: definition.target_audience,
            sample_percent: definition.sample_percent,
            status,
            created_at: now,
            concluded_at: None,
            winning_variant_id: None,
        }
    }

    /// Active and inside its activity window
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == ExperimentStatus::Active
            && self.start_date <= now
            && self.end_date.map_or(true, |end| now < end)
    }

    pub fn variant(&self, variant_id: &str) -> Option<&ExperimentVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Flagged control, or the first variant when none is flagged
    pub fn control_variant(&self) -> Option<&ExperimentVariant> {
        self.variants
            .iter()
            .find(|v| v.is_control)
            .or_else(|| self.variants.first())
    }
}

/// A visitor's sticky bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAssignment {
    pub user_id: String,
    pub experiment_id: String,
    pub variant_id: String,
    pub session_id: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentEventType {
    View,
    Click,
    Feedback,
    Conversion,
}

impl ExperimentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentEventType::View => "view",
            ExperimentEventType::Click => "click",
            ExperimentEventType::Feedback => "feedback",
            ExperimentEventType::Conversion => "conversion",
        }
    }
}

/// Tracked occurrence within an experiment (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentEvent {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub experiment_id: String,
    pub variant_id: String,
    pub user_id: String,
    pub event_type: ExperimentEventType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExperimentEvent {
    pub fn new(assignment: &UserAssignment, event_type: ExperimentEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            experiment_id: assignment.experiment_id.clone(),
            variant_id: assignment.variant_id.clone(),
            user_id: assignment.user_id.clone(),
            event_type,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Rating carried by a feedback event, if any
    pub fn rating(&self) -> Option<f64> {
        self.metadata.get("rating").and_then(|v| v.as_f64())
    }
}
