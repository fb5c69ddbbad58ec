// ============================================
// Behavioral Learner
// ============================================
//
// boost = min(2 * views_of_same_type, 10) + 5 * estimates_of_same_type
//
// No clamping here; the scorer bounds the final confidence.

use crate::models::{BehaviorAction, ProjectRecommendation, UserBehavior};

const VIEW_WEIGHT: u32 = 2;
const VIEW_BOOST_CAP: u32 = 10;
const ESTIMATE_WEIGHT: u32 = 5;

pub fn apply_behavioral_learning(
    candidates: Vec<ProjectRecommendation>,
    history: &[UserBehavior],
) -> Vec<ProjectRecommendation> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            let boost = behavior_boost(&candidate.project_type, history);
            candidate.confidence = candidate.confidence.saturating_add(boost);
            candidate
        })
        .collect()
}

pub fn behavior_boost(project_type: &str, history: &[UserBehavior]) -> u32 {
    let count = |action: BehaviorAction| {
        history
            .iter()
            .filter(|b| b.action == action && b.project_type.as_deref() == Some(project_type))
            .count() as u32
    };

    let views = count(BehaviorAction::View);
    let estimates = count(BehaviorAction::Estimate);

    (views.saturating_mul(VIEW_WEIGHT)).min(VIEW_BOOST_CAP)
        + estimates.saturating_mul(ESTIMATE_WEIGHT)
}
