/// Results Service - Per-variant aggregation and significance for experiments
use super::experiment_service::ExperimentError;
use super::significance::{compare_to_control, Proportion, SignificanceResult};
use crate::db::{AssignmentStore, EventStore, ExperimentStore};
use crate::models::{ExperimentEvent, ExperimentEventType, ExperimentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResultsService {
    experiments: Arc<dyn ExperimentStore>,
    assignments: Arc<dyn AssignmentStore>,
    events: Arc<dyn EventStore>,
    significance_threshold: f64,
}

/// Metrics for a single variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResults {
    pub variant_id: String,
    pub variant_name: String,
    pub is_control: bool,
    /// Distinct users with at least one event
    pub users: usize,
    pub views: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub feedback_count: u64,
    /// clicks / views (percent)
    pub click_through_rate: f64,
    /// conversions / views (percent)
    pub conversion_rate: f64,
    /// Mean of feedback ratings > 0
    pub average_rating: f64,
}

/// Experiment results by variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub experiment_id: String,
    pub name: String,
    pub status: ExperimentStatus,
    pub total_assigned: usize,
    pub total_events: usize,
    pub control_variant_id: Option<String>,
    pub variants: Vec<VariantResults>,
    pub significance: Vec<SignificanceResult>,
    pub winning_variant_id: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ResultsService {
    pub fn new(
        experiments: Arc<dyn ExperimentStore>,
        assignments: Arc<dyn AssignmentStore>,
        events: Arc<dyn EventStore>,
        significance_threshold: f64,
    ) -> Self {
        Self {
            experiments,
            assignments,
            events,
            significance_threshold,
        }
    }

    /// Get experiment results, recomputed from the event log
    pub async fn get_experiment_results(
        &self,
        experiment_id: &str,
    ) -> Result<ExperimentResults, ExperimentError> {
        let experiment = self
            .experiments
            .get_experiment(experiment_id)
            .await?
            .ok_or_else(|| ExperimentError::NotFound(experiment_id.to_string()))?;

        let events = self.events.events_for_experiment(experiment_id).await?;
        let total_assigned = self.assignments.count_assignments(experiment_id).await?;

        let variants: Vec<VariantResults> = experiment
            .variants
            .iter()
            .map(|v| {
                let own: Vec<&ExperimentEvent> =
                    events.iter().filter(|e| e.variant_id == v.id).collect();
                aggregate_variant(&v.id, &v.name, v.is_control, &own)
            })
            .collect();

        let control_variant_id = experiment.control_variant().map(|c| c.id.clone());
        let significance = match control_variant_id
            .as_deref()
            .and_then(|id| variants.iter().find(|v| v.variant_id == id))
        {
            Some(control) => variants
                .iter()
                .filter(|v| v.variant_id != control.variant_id)
                .map(|v| {
                    compare_to_control(
                        &control.variant_id,
                        Proportion::new(control.conversions, control.views),
                        &v.variant_id,
                        Proportion::new(v.conversions, v.views),
                        self.significance_threshold,
                    )
                })
                .collect(),
            None => Vec::new(),
        };

        tracing::debug!(
            experiment_id = %experiment_id,
            total_events = events.len(),
            total_assigned,
            "Computed experiment results"
        );

        Ok(ExperimentResults {
            experiment_id: experiment.id,
            name: experiment.name,
            status: experiment.status,
            total_assigned,
            total_events: events.len(),
            control_variant_id,
            variants,
            significance,
            winning_variant_id: experiment.winning_variant_id,
            generated_at: Utc::now(),
        })
    }
}

pub fn aggregate_variant(
    variant_id: &str,
    variant_name: &str,
    is_control: bool,
    events: &[&ExperimentEvent],
) -> VariantResults {
    let count = |t: ExperimentEventType| events.iter().filter(|e| e.event_type == t).count() as u64;

    let views = count(ExperimentEventType::View);
    let clicks = count(ExperimentEventType::Click);
    let conversions = count(ExperimentEventType::Conversion);
    let feedback_count = count(ExperimentEventType::Feedback);

    let users: HashSet<&str> = events.iter().map(|e| e.user_id.as_str()).collect();

    let ratings: Vec<f64> = events
        .iter()
        .filter(|e| e.event_type == ExperimentEventType::Feedback)
        .filter_map(|e| e.rating())
        .filter(|r| *r > 0.0)
        .collect();
    let average_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    let per_view = |n: u64| {
        if views == 0 {
            0.0
        } else {
            n as f64 / views as f64 * 100.0
        }
    };

    VariantResults {
        variant_id: variant_id.to_string(),
        variant_name: variant_name.to_string(),
        is_control,
        users: users.len(),
        views,
        clicks,
        conversions,
        feedback_count,
        click_through_rate: per_view(clicks),
        conversion_rate: per_view(conversions),
        average_rating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserAssignment;

    fn event(user: &str, event_type: ExperimentEventType) -> ExperimentEvent {
        let assignment = UserAssignment {
            user_id: user.to_string(),
            experiment_id: "exp".to_string(),
            variant_id: "control".to_string(),
            session_id: "s".to_string(),
            assigned_at: Utc::now(),
        };
        ExperimentEvent::new(&assignment, event_type)
    }

    #[test]
    fn test_aggregate_rates() {
        let mut events = Vec::new();
        for i in 0..10 {
            events.push(event(&format!("user-{}", i), ExperimentEventType::View));
        }
        for i in 0..4 {
            events.push(event(&format!("user-{}", i), ExperimentEventType::Click));
        }
        events.push(event("user-0", ExperimentEventType::Conversion));
        events.push(event("user-1", ExperimentEventType::Feedback).with_metadata("rating", 4));
        events.push(event("user-2", ExperimentEventType::Feedback).with_metadata("rating", 0));

        let refs: Vec<&ExperimentEvent> = events.iter().collect();
        let results = aggregate_variant("control", "Control", true, &refs);

        assert_eq!(results.users, 10);
        assert_eq!(results.views, 10);
        assert_eq!(results.clicks, 4);
        assert_eq!(results.conversions, 1);
        assert_eq!(results.feedback_count, 2);
        assert!((results.click_through_rate - 40.0).abs() < 1e-9);
        assert!((results.conversion_rate - 10.0).abs() < 1e-9);
        assert!((results.average_rating - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_without_views() {
        let events = vec![event("user-0", ExperimentEventType::Click)];
        let refs: Vec<&ExperimentEvent> = events.iter().collect();
        let results = aggregate_variant("control", "Control", true, &refs);

        assert_eq!(results.click_through_rate, 0.0);
        assert_eq!(results.conversion_rate, 0.0);
        assert_eq!(results.average_rating, 0.0);
    }
}
