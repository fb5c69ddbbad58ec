pub mod experiment;

pub use experiment::{
    AlgorithmType, Experiment, ExperimentDefinition, ExperimentEvent, ExperimentEventType,
    ExperimentStatus, ExperimentVariant, ScoringWeights, TargetAudience, UserAssignment,
    VariantConfiguration, DEFAULT_RECOMMENDATION_COUNT,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Visitor session state as declared by the website.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub is_veteran: bool,
    #[serde(default)]
    pub veteran_details: Option<VeteranProfile>,
    pub preferences: UserPreferences,
    #[serde(default)]
    pub behavior_history: Vec<UserBehavior>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub previous_projects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeteranProfile {
    pub service_branch: String,
    #[serde(default)]
    pub service_era: String,
    #[serde(default)]
    pub combat_veteran: bool,
    /// VA disability rating (0-100)
    #[serde(default)]
    pub disability_rating: Option<u8>,
    #[serde(default)]
    pub special_programs: Vec<String>,
    #[serde(default)]
    pub preferred_specialist: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub budget_range: BudgetRange,
    /// Requested categories: residential, commercial, renovation, addition
    #[serde(default)]
    pub project_types: Vec<String>,
    #[serde(default)]
    pub timeframe: String,
    /// e.g. energy_efficiency, accessibility, security
    #[serde(default)]
    pub priorities: Vec<String>,
    #[serde(default)]
    pub communication_style: CommunicationStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

impl BudgetRange {
    pub fn average(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStyle {
    Formal,
    #[default]
    Casual,
    Military,
}

/// One entry of the visitor's behavior log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBehavior {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub action: BehaviorAction,
    #[serde(default)]
    pub page: String,
    /// Project type the action was about (kitchen, bathroom, ...)
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub session_duration_secs: Option<u64>,
    #[serde(default)]
    pub conversion_event: bool,
}

impl UserBehavior {
    pub fn new(action: BehaviorAction, project_type: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            page: String::new(),
            project_type: project_type.map(str::to_string),
            data: serde_json::Value::Null,
            session_duration_secs: None,
            conversion_event: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorAction {
    View,
    Estimate,
    Contact,
    Convert,
    #[serde(other)]
    Other,
}

/// A scored project suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecommendation {
    pub id: String,
    pub project_type: String,
    pub title: String,
    pub description: String,
    /// Bounded to [0, 100] once the scorer has run; intermediate stages may exceed it.
    pub confidence: u32,
    pub reasoning: Vec<String>,
    pub estimated_cost: CostRange,
    pub timeline: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub veteran_benefits: Option<Vec<VeteranBenefit>>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: f64,
    pub max: f64,
    pub currency: String,
}

impl CostRange {
    pub fn usd(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            currency: "USD".to_string(),
        }
    }

    pub fn average(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn overlaps(&self, budget: &BudgetRange) -> bool {
        self.min <= budget.max && self.max >= budget.min
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeteranBenefit {
    #[serde(rename = "type")]
    pub benefit_type: BenefitType,
    pub title: String,
    pub description: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenefitType {
    Discount,
    Priority,
    Financing,
    Specialist,
    Liaison,
}

/// Visitor rating/outcome on a recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationFeedback {
    pub recommendation_id: String,
    pub user_id: String,
    /// 1-5 stars, 0 = no rating supplied
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub clicked: bool,
    #[serde(default)]
    pub converted: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Highest star rating a visitor can give
pub const MAX_RATING: u8 = 5;

impl RecommendationFeedback {
    pub fn has_valid_rating(&self) -> bool {
        self.rating <= MAX_RATING
    }
}

/// Aggregated feedback performance, recomputed on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub total_recommendations: usize,
    pub click_through_rate: f64,
    pub conversion_rate: f64,
    pub average_rating: f64,
    pub accuracy_score: f64,
}

/// Request context supplied by the website.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationContext {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub experiment_assignment: Option<UserAssignment>,
    #[serde(default)]
    pub variant_config: Option<VariantConfiguration>,
}

/// Requested project category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Residential,
    Commercial,
    Renovation,
    Addition,
}

impl ProjectCategory {
    /// Canonical emission order of the catalog.
    pub const ALL: [ProjectCategory; 4] = [
        ProjectCategory::Residential,
        ProjectCategory::Commercial,
        ProjectCategory::Renovation,
        ProjectCategory::Addition,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "residential" => Some(ProjectCategory::Residential),
            "commercial" => Some(ProjectCategory::Commercial),
            "renovation" => Some(ProjectCategory::Renovation),
            "addition" => Some(ProjectCategory::Addition),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectCategory::Residential => "residential",
            ProjectCategory::Commercial => "commercial",
            ProjectCategory::Renovation => "renovation",
            ProjectCategory::Addition => "addition",
        }
    }
}

impl fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
