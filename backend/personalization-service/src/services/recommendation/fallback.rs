//! Fallback recommendations when the engine fails
//!
//! Returned instead of an error so the website always has something to
//! show. The list is fixed and non-empty; veterans additionally see the base
//! veteran discount.

use super::veteran::base_discount;
use crate::models::{CostRange, Priority, ProjectRecommendation, UserProfile};
use tracing::debug;

pub const FALLBACK_RECOMMENDATION_ID: &str = "fallback-kitchen";

pub fn fallback_recommendations(profile: &UserProfile) -> Vec<ProjectRecommendation> {
    debug!(user_id = %profile.id, "Serving fallback recommendations");

    vec![ProjectRecommendation {
        id: FALLBACK_RECOMMENDATION_ID.to_string(),
        project_type: "kitchen".to_string(),
        title: "Kitchen Upgrade".to_string(),
        description: "Modernize your kitchen with new appliances and finishes.".to_string(),
        confidence: 70,
        reasoning: vec![
            "Popular project type".to_string(),
            "Good return on investment".to_string(),
        ],
        estimated_cost: CostRange::usd(25_000.0, 60_000.0),
        timeline: "4-8 weeks".to_string(),
        priority: Priority::Medium,
        veteran_benefits: profile.is_veteran.then(|| vec![base_discount()]),
        tags: vec![
            "fallback".to_string(),
            "kitchen".to_string(),
            "popular".to_string(),
        ],
    }]
}
