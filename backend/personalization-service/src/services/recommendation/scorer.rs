//! Candidate Scoring Module
//!
//! Combines budget fit, timeline fit, priority tier and veteran bonus into a
//! bounded confidence score, then sorts and truncates.
//!
//! The combination is successive averaging plus additive bonuses:
//!
//! ```text
//! score = (confidence + budget_score) / 2
//! score = (score + timeline_score) / 2
//! score += priority_bonus + veteran_bonus
//! final = clamp(round(score), 0, 100)
//! ```
//!
//! The variant's `ScoringWeights` are advisory and do not enter the formula.

use super::profile_analyzer::Urgency;
use crate::models::{BudgetRange, CostRange, Priority, ProjectRecommendation, ScoringWeights};
use tracing::debug;

pub const MAX_CONFIDENCE: f64 = 100.0;

const TIMELINE_SCORE_SOON_WEEKS: f64 = 100.0;
const TIMELINE_SCORE_IMMEDIATE_WEEKS: f64 = 90.0;
const TIMELINE_SCORE_DEFAULT: f64 = 75.0;

const HIGH_PRIORITY_BONUS: f64 = 5.0;
const MEDIUM_PRIORITY_BONUS: f64 = 2.0;
const VETERAN_BONUS: f64 = 3.0;

/// Unit of a catalog timeline string such as "4-8 weeks"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineUnit {
    Weeks,
    Months,
    Unknown,
}

impl TimelineUnit {
    pub fn from_timeline(timeline: &str) -> Self {
        let unit = timeline
            .split_whitespace()
            .last()
            .map(|w| w.to_ascii_lowercase())
            .unwrap_or_default();

        match unit.as_str() {
            "week" | "weeks" => TimelineUnit::Weeks,
            "month" | "months" => TimelineUnit::Months,
            _ => TimelineUnit::Unknown,
        }
    }
}

/// 100 when the project's average cost is inside the budget, otherwise
/// decays by 50 points per 100% relative distance from the budget midpoint.
pub fn budget_score(cost: &CostRange, budget: &BudgetRange) -> f64 {
    let project_avg = cost.average();
    if budget.contains(project_avg) {
        return 100.0;
    }

    let user_avg = budget.average();
    if user_avg <= 0.0 {
        return 0.0;
    }

    let distance = (project_avg - user_avg).abs() / user_avg;
    (100.0 - distance * 50.0).max(0.0)
}

pub fn timeline_score(urgency: Urgency, project_timeline: &str) -> f64 {
    match (urgency, TimelineUnit::from_timeline(project_timeline)) {
        (Urgency::Immediate, TimelineUnit::Weeks) => TIMELINE_SCORE_IMMEDIATE_WEEKS,
        (Urgency::Soon, TimelineUnit::Weeks) => TIMELINE_SCORE_SOON_WEEKS,
        _ => TIMELINE_SCORE_DEFAULT,
    }
}

fn priority_bonus(priority: Priority) -> f64 {
    match priority {
        Priority::High => HIGH_PRIORITY_BONUS,
        Priority::Medium => MEDIUM_PRIORITY_BONUS,
        Priority::Low => 0.0,
    }
}

/// Final bounded confidence for one candidate
pub fn final_confidence(
    candidate: &ProjectRecommendation,
    budget: &BudgetRange,
    urgency: Urgency,
) -> u32 {
    let mut score = candidate.confidence as f64;

    score = (score + budget_score(&candidate.estimated_cost, budget)) / 2.0;
    score = (score + timeline_score(urgency, &candidate.timeline)) / 2.0;

    score += priority_bonus(candidate.priority);

    if candidate
        .veteran_benefits
        .as_ref()
        .map_or(false, |b| !b.is_empty())
    {
        score += VETERAN_BONUS;
    }

    score.round().clamp(0.0, MAX_CONFIDENCE) as u32
}

pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score, sort by descending confidence and truncate to `limit`.
    /// The sort is stable, so ties keep candidate insertion order.
    pub fn rank(
        &self,
        candidates: Vec<ProjectRecommendation>,
        budget: &BudgetRange,
        urgency: Urgency,
        limit: usize,
    ) -> Vec<ProjectRecommendation> {
        let mut scored: Vec<ProjectRecommendation> = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.confidence = final_confidence(&candidate, budget, urgency);
                candidate
            })
            .collect();

        scored.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        scored.truncate(limit);

        debug!(
            ranked_count = scored.len(),
            top_confidence = scored.first().map(|c| c.confidence),
            budget_weight = self.weights.budget_match,
            "Scoring complete"
        );

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recommendation::candidates::CATALOG;

    const BUDGET: BudgetRange = BudgetRange {
        min: 25_000.0,
        max: 75_000.0,
    };

    #[test]
    fn test_budget_score_inside_range() {
        assert_eq!(budget_score(&CostRange::usd(25_000.0, 75_000.0), &BUDGET), 100.0);
        assert_eq!(budget_score(&CostRange::usd(40_000.0, 60_000.0), &BUDGET), 100.0);
    }

    #[test]
    fn test_budget_score_decays_with_distance() {
        // project avg 200k, user avg 50k -> distance 3.0 -> 100 - 150 -> 0
        assert_eq!(budget_score(&CostRange::usd(100_000.0, 300_000.0), &BUDGET), 0.0);
        // project avg 100k -> distance 1.0 -> 50
        assert_eq!(budget_score(&CostRange::usd(50_000.0, 150_000.0), &BUDGET), 50.0);
    }

    #[test]
    fn test_timeline_scores() {
        assert_eq!(timeline_score(Urgency::Soon, "4-8 weeks"), 100.0);
        assert_eq!(timeline_score(Urgency::Immediate, "4-8 weeks"), 90.0);
        assert_eq!(timeline_score(Urgency::Planned, "4-8 weeks"), 75.0);
        assert_eq!(timeline_score(Urgency::Unknown, "4-8 weeks"), 75.0);
        assert_eq!(timeline_score(Urgency::Soon, "2-3 months"), 75.0);
    }

    #[test]
    fn test_final_confidence_kitchen() {
        // (85 + 100) / 2 = 92.5; (92.5 + 75) / 2 = 83.75; +5 high = 88.75 -> 89
        let kitchen = CATALOG[0].to_candidate();
        assert_eq!(final_confidence(&kitchen, &BUDGET, Urgency::Unknown), 89);
    }

    #[test]
    fn test_final_confidence_is_clamped() {
        let mut kitchen = CATALOG[0].to_candidate();
        kitchen.confidence = 400;
        assert_eq!(final_confidence(&kitchen, &BUDGET, Urgency::Soon), 100);
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let candidates: Vec<ProjectRecommendation> =
            CATALOG.iter().map(|e| e.to_candidate()).collect();
        let ranked = Scorer::new(ScoringWeights::default()).rank(
            candidates,
            &BUDGET,
            Urgency::Unknown,
            3,
        );

        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(ranked[0].project_type, "kitchen");
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let first = CATALOG[0].to_candidate();
        let mut second = CATALOG[0].to_candidate();
        second.title = "Second".to_string();
        let first_id = first.id.clone();

        let ranked = Scorer::new(ScoringWeights::default()).rank(
            vec![first, second],
            &BUDGET,
            Urgency::Unknown,
            6,
        );
        assert_eq!(ranked[0].id, first_id);
        assert_eq!(ranked[1].title, "Second");
    }
}
