// ============================================
// Profile Analyzer
// ============================================
//
// Derives the feature bundle the generator and scorer work from:
// budget tier, urgency, behavior counters, veteran priorities.

use super::{RecommendationError, Result};
use crate::models::{BehaviorAction, ProjectCategory, UserBehavior, UserProfile, VeteranProfile};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Budget,
    Moderate,
    Premium,
    Luxury,
}

impl BudgetTier {
    pub fn from_average(avg_budget: f64) -> Self {
        if avg_budget < 25_000.0 {
            BudgetTier::Budget
        } else if avg_budget < 75_000.0 {
            BudgetTier::Moderate
        } else if avg_budget < 150_000.0 {
            BudgetTier::Premium
        } else {
            BudgetTier::Luxury
        }
    }
}

/// Visitor urgency parsed from the free-text timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    Soon,
    Planned,
    /// Timeframe text matched nothing in the keyword table
    Unknown,
}

/// Checked in order; the first matching row wins.
const URGENCY_KEYWORDS: &[(Urgency, &[&str])] = &[
    (
        Urgency::Immediate,
        &["immediately", "immediate", "asap", "right away", "urgent"],
    ),
    (Urgency::Soon, &["month", "soon", "next few weeks"]),
    (
        Urgency::Planned,
        &["year", "planning", "later", "flexible", "future", "someday"],
    ),
];

impl Urgency {
    pub fn from_timeframe(timeframe: &str) -> Self {
        let normalized = timeframe.trim().to_lowercase();
        if normalized.is_empty() {
            return Urgency::Unknown;
        }

        URGENCY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
            .map(|(urgency, _)| *urgency)
            .unwrap_or(Urgency::Unknown)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorPatterns {
    pub total_actions: usize,
    pub page_views: usize,
    pub estimator_usage: usize,
    pub contact_attempts: usize,
    pub conversions: usize,
}

impl BehaviorPatterns {
    pub fn from_history(history: &[UserBehavior]) -> Self {
        let mut patterns = BehaviorPatterns {
            total_actions: history.len(),
            ..Default::default()
        };

        for behavior in history {
            match behavior.action {
                BehaviorAction::View => patterns.page_views += 1,
                BehaviorAction::Estimate => patterns.estimator_usage += 1,
                BehaviorAction::Contact => patterns.contact_attempts += 1,
                BehaviorAction::Convert => patterns.conversions += 1,
                BehaviorAction::Other => {}
            }
        }

        patterns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VeteranPriorities {
    pub accessibility_needs: bool,
    pub security_focus: bool,
}

impl VeteranPriorities {
    pub fn from_profile(details: &VeteranProfile) -> Self {
        Self {
            accessibility_needs: details.disability_rating.map_or(false, |r| r > 0),
            security_focus: details.combat_veteran,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFactors {
    pub weather_considerations: bool,
    pub seismic_requirements: bool,
    pub energy_efficiency_priority: bool,
}

/// Feature bundle for one request (not persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAnalysis {
    pub budget_tier: BudgetTier,
    pub urgency: Urgency,
    pub project_interests: Vec<ProjectCategory>,
    pub behavior: BehaviorPatterns,
    pub location: Option<LocationFactors>,
    pub veteran_priorities: Option<VeteranPriorities>,
}

/// Validate the profile and derive its analysis.
///
/// Profiles with an inverted or non-positive budget, an out-of-range
/// disability rating, or a veteran flag without details are rejected.
pub fn analyze_profile(profile: &UserProfile) -> Result<ProfileAnalysis> {
    let budget = profile.preferences.budget_range;
    if !budget.min.is_finite() || !budget.max.is_finite() || budget.min < 0.0 {
        return Err(RecommendationError::InvalidProfile(format!(
            "budget range must be finite and non-negative (got {} - {})",
            budget.min, budget.max
        )));
    }
    if budget.min > budget.max {
        return Err(RecommendationError::InvalidProfile(format!(
            "budget min {} exceeds max {}",
            budget.min, budget.max
        )));
    }
    if budget.average() <= 0.0 {
        return Err(RecommendationError::InvalidProfile(
            "budget range average must be positive".to_string(),
        ));
    }

    let veteran_priorities = if profile.is_veteran {
        let details = profile.veteran_details.as_ref().ok_or_else(|| {
            RecommendationError::InvalidProfile(format!(
                "user {} is flagged as veteran without veteran details",
                profile.id
            ))
        })?;
        if details.disability_rating.map_or(false, |r| r > 100) {
            return Err(RecommendationError::InvalidProfile(
                "disability rating must be between 0 and 100".to_string(),
            ));
        }
        Some(VeteranPriorities::from_profile(details))
    } else {
        None
    };

    let project_interests: Vec<ProjectCategory> = ProjectCategory::ALL
        .iter()
        .copied()
        .filter(|category| {
            profile
                .preferences
                .project_types
                .iter()
                .any(|requested| ProjectCategory::parse(requested) == Some(*category))
        })
        .collect();

    let location = profile
        .location
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .map(|_| LocationFactors {
            weather_considerations: true,
            seismic_requirements: true,
            energy_efficiency_priority: true,
        });

    let analysis = ProfileAnalysis {
        budget_tier: BudgetTier::from_average(budget.average()),
        urgency: Urgency::from_timeframe(&profile.preferences.timeframe),
        project_interests,
        behavior: BehaviorPatterns::from_history(&profile.behavior_history),
        location,
        veteran_priorities,
    };

    debug!(
        user_id = %profile.id,
        budget_tier = ?analysis.budget_tier,
        urgency = ?analysis.urgency,
        interests = analysis.project_interests.len(),
        "Profile analyzed"
    );

    Ok(analysis)
}
