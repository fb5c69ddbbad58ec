//! Recommendation engine
//!
//! Pipeline per request: profile analysis, experiment assignment, candidate
//! generation, veteran enhancement, behavioral learning, scoring. Any failure
//! along the way is logged and answered with the fallback list.

pub mod behavior;
pub mod candidates;
pub mod fallback;
pub mod profile_analyzer;
pub mod scorer;
pub mod veteran;

use crate::db::{FeedbackStore, MemoryStore, ProfileStore, StoreError};
use crate::metrics;
use crate::models::{
    Experiment, ExperimentDefinition, ExperimentEvent, ExperimentEventType, ProjectRecommendation,
    RecommendationContext, RecommendationFeedback, RecommendationMetrics, UserAssignment,
    UserBehavior, UserProfile, VariantConfiguration, DEFAULT_RECOMMENDATION_COUNT, MAX_RATING,
};
use crate::services::analytics::{
    AnalyticsEvent, AnalyticsSink, TracingAnalyticsSink, RECOMMENDATIONS_GENERATED,
    RECOMMENDATION_FEEDBACK,
};
use crate::services::experiments::{
    ABTestingFramework, AssignmentError, AssignmentResponse, ExperimentError, ExperimentResults,
    DEFAULT_SIGNIFICANCE_THRESHOLD,
};
use candidates::CandidateGenerator;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    #[error("Experiment error: {0}")]
    Experiment(#[from] ExperimentError),

    #[error("Assignment error: {0}")]
    Assignment(#[from] AssignmentError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RecommendationError>;

#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// List length when the visitor holds no variant
    pub default_count: usize,
    pub enable_ab_testing: bool,
    pub significance_threshold: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_RECOMMENDATION_COUNT,
            enable_ab_testing: true,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
        }
    }
}

/// Ranked list plus the context it was produced under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationBatch {
    pub recommendations: Vec<ProjectRecommendation>,
    pub context: RecommendationContext,
    /// True when the fallback list was served
    pub fallback: bool,
}

pub struct RecommendationEngine {
    framework: ABTestingFramework,
    profiles: Arc<dyn ProfileStore>,
    feedback: Arc<dyn FeedbackStore>,
    analytics: Arc<dyn AnalyticsSink>,
    generator: CandidateGenerator,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(
        framework: ABTestingFramework,
        profiles: Arc<dyn ProfileStore>,
        feedback: Arc<dyn FeedbackStore>,
        analytics: Arc<dyn AnalyticsSink>,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            framework,
            profiles,
            feedback,
            analytics,
            generator: CandidateGenerator::new(),
            config,
        }
    }

    /// Engine over a single process-local store
    pub fn in_memory(config: RecommendationConfig) -> Self {
        Self::in_memory_with_sink(config, Arc::new(TracingAnalyticsSink))
    }

    pub fn in_memory_with_sink(
        config: RecommendationConfig,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let framework = ABTestingFramework::new(
            store.clone(),
            store.clone(),
            store.clone(),
            config.enable_ab_testing,
            config.significance_threshold,
        );
        Self::new(framework, store.clone(), store, analytics, config)
    }

    pub fn framework(&self) -> &ABTestingFramework {
        &self.framework
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Ranked recommendations for a visitor. Never fails.
    pub async fn generate_recommendations(
        &self,
        profile: &UserProfile,
        context: Option<RecommendationContext>,
    ) -> Vec<ProjectRecommendation> {
        self.generate_with_context(profile, context)
            .await
            .recommendations
    }

    /// Same as `generate_recommendations`, keeping the enriched context
    pub async fn generate_with_context(
        &self,
        profile: &UserProfile,
        context: Option<RecommendationContext>,
    ) -> RecommendationBatch {
        let context = context.unwrap_or_default();

        match self.try_generate(profile, context.clone()).await {
            Ok(batch) => {
                metrics::record_recommendations_served("engine");
                batch
            }
            Err(e) => {
                error!(
                    user_id = %profile.id,
                    error = %e,
                    "Recommendation generation failed, serving fallback"
                );
                metrics::record_recommendations_served("fallback");
                RecommendationBatch {
                    recommendations: fallback::fallback_recommendations(profile),
                    context,
                    fallback: true,
                }
            }
        }
    }

    async fn try_generate(
        &self,
        profile: &UserProfile,
        context: RecommendationContext,
    ) -> Result<RecommendationBatch> {
        // reject malformed profiles before they reach the store
        profile_analyzer::analyze_profile(profile)?;

        let profile = self.profiles.register_profile(profile.clone()).await?;
        let analysis = profile_analyzer::analyze_profile(&profile)?;

        let session_id = resolve_session_id(&context, &profile);

        let assignment = self
            .framework
            .assignments
            .assign_user_to_experiment(&profile.id, &session_id, Some(&profile))
            .await?;
        let variant_config = match &assignment {
            Some(_) => {
                self.framework
                    .assignments
                    .get_variant_configuration(&profile.id)
                    .await?
            }
            None => None,
        };

        let config = variant_config.clone().unwrap_or_else(|| VariantConfiguration {
            recommendation_count: self.config.default_count,
            ..VariantConfiguration::default()
        });

        let budget = profile.preferences.budget_range;
        let mut candidates = self
            .generator
            .generate(&analysis, &budget, config.algorithm_type);

        if let Some(details) = profile.veteran_details.as_ref().filter(|_| profile.is_veteran) {
            candidates = veteran::enhance_for_veterans(candidates, details);
        }

        candidates = behavior::apply_behavioral_learning(candidates, &profile.behavior_history);

        let ranked = scorer::Scorer::new(config.scoring_weights).rank(
            candidates,
            &budget,
            analysis.urgency,
            config.recommendation_count,
        );

        self.profiles
            .save_recommendations(&profile.id, ranked.clone())
            .await?;

        if let Some(assignment) = &assignment {
            let mut event = ExperimentEvent::new(assignment, ExperimentEventType::View)
                .with_metadata("recommendation_count", ranked.len());
            if let Some(top) = ranked.first() {
                event = event.with_metadata("top_recommendation", top.project_type.clone());
            }
            self.track_quietly(event).await;
        }

        self.analytics.emit(AnalyticsEvent::new(
            RECOMMENDATIONS_GENERATED,
            json!({
                "user_id": profile.id,
                "recommendations_count": ranked.len(),
                "top_recommendation": ranked.first().map(|r| r.project_type.clone()),
                "experiment_id": assignment.as_ref().map(|a| a.experiment_id.clone()),
                "variant_id": assignment.as_ref().map(|a| a.variant_id.clone()),
            }),
        ));

        debug!(
            user_id = %profile.id,
            count = ranked.len(),
            experiment_id = ?assignment.as_ref().map(|a| &a.experiment_id),
            "Recommendations generated"
        );

        Ok(RecommendationBatch {
            recommendations: ranked,
            context: RecommendationContext {
                session_id: Some(session_id),
                experiment_assignment: assignment,
                variant_config,
                ..context
            },
            fallback: false,
        })
    }

    /// Append feedback. Failures are logged and counted, never returned.
    pub async fn record_feedback(&self, feedback: RecommendationFeedback) {
        if let Err(e) = self.try_record_feedback(feedback.clone()).await {
            let status = match &e {
                RecommendationError::InvalidFeedback(_) => "rejected",
                _ => "dropped",
            };
            warn!(
                user_id = %feedback.user_id,
                recommendation_id = %feedback.recommendation_id,
                error = %e,
                "Failed to record feedback"
            );
            metrics::record_feedback(status);
            return;
        }
        metrics::record_feedback("recorded");

        let assignment = match self.link_feedback_to_experiment(&feedback).await {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!(
                    user_id = %feedback.user_id,
                    error = %e,
                    "Feedback stored without experiment event"
                );
                None
            }
        };

        self.analytics.emit(AnalyticsEvent::new(
            RECOMMENDATION_FEEDBACK,
            json!({
                "recommendation_id": feedback.recommendation_id,
                "rating": feedback.rating,
                "clicked": feedback.clicked,
                "converted": feedback.converted,
                "experiment_id": assignment.as_ref().map(|a| a.experiment_id.clone()),
                "variant_id": assignment.as_ref().map(|a| a.variant_id.clone()),
            }),
        ));
    }

    /// Validate and append to the feedback log
    pub async fn try_record_feedback(&self, feedback: RecommendationFeedback) -> Result<()> {
        if !feedback.has_valid_rating() {
            return Err(RecommendationError::InvalidFeedback(format!(
                "rating must be between 0 and {}, got {}",
                MAX_RATING, feedback.rating
            )));
        }
        self.feedback.append_feedback(feedback).await?;
        Ok(())
    }

    /// Emit a feedback event when the visitor holds a live assignment
    async fn link_feedback_to_experiment(
        &self,
        feedback: &RecommendationFeedback,
    ) -> Result<Option<UserAssignment>> {
        let assignment: Option<UserAssignment> = self
            .framework
            .assignments
            .current_assignment(&feedback.user_id)
            .await?
            .map(|(assignment, _)| assignment);

        if let Some(assignment) = &assignment {
            let mut event = ExperimentEvent::new(assignment, ExperimentEventType::Feedback)
                .with_metadata("recommendation_id", feedback.recommendation_id.clone())
                .with_metadata("rating", feedback.rating);
            event.timestamp = feedback.timestamp;

            if let Some(project_type) = self
                .project_type_of(&feedback.user_id, &feedback.recommendation_id)
                .await?
            {
                event = event.with_metadata("project_type", project_type);
            }

            self.track_quietly(event).await;
        }

        Ok(assignment)
    }

    async fn project_type_of(
        &self,
        user_id: &str,
        recommendation_id: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .profiles
            .last_recommendations(user_id)
            .await?
            .and_then(|batch| {
                batch
                    .into_iter()
                    .find(|r| r.id == recommendation_id)
                    .map(|r| r.project_type)
            }))
    }

    /// Append to a registered visitor's history; returns whether it was stored
    pub async fn track_user_behavior(&self, user_id: &str, behavior: UserBehavior) -> bool {
        match self.profiles.append_behavior(user_id, behavior).await {
            Ok(true) => {
                metrics::record_behavior("recorded");
                true
            }
            Ok(false) => {
                debug!(user_id = %user_id, "Behavior ignored for unregistered user");
                false
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to track behavior");
                metrics::record_behavior("dropped");
                false
            }
        }
    }

    /// Totals over the whole feedback log
    pub async fn get_metrics(&self) -> Result<RecommendationMetrics> {
        let feedback = self.feedback.all_feedback().await?;
        Ok(compute_metrics(&feedback))
    }

    /// Latest feedback received for a recommendation
    pub async fn latest_feedback_for(
        &self,
        recommendation_id: &str,
    ) -> Result<Option<RecommendationFeedback>> {
        Ok(self.feedback.latest_feedback_for(recommendation_id).await?)
    }

    pub async fn create_experiment(
        &self,
        definition: ExperimentDefinition,
    ) -> std::result::Result<Experiment, ExperimentError> {
        self.framework
            .experiments
            .create_experiment(definition)
            .await
    }

    pub async fn start_experiment(
        &self,
        experiment_id: &str,
    ) -> std::result::Result<Experiment, ExperimentError> {
        self.framework.experiments.start_experiment(experiment_id).await
    }

    pub async fn conclude_experiment(
        &self,
        experiment_id: &str,
        winning_variant_id: Option<String>,
    ) -> std::result::Result<Experiment, ExperimentError> {
        self.framework
            .experiments
            .conclude_experiment(experiment_id, winning_variant_id)
            .await
    }

    /// Record an experiment event. Failures are logged and counted before
    /// being returned; callers may ignore the result.
    pub async fn track_experiment_event(
        &self,
        event: ExperimentEvent,
    ) -> std::result::Result<(), ExperimentError> {
        let experiment_id = event.experiment_id.clone();
        let result = self.framework.tracker.track_event(event).await;
        if let Err(e) = &result {
            warn!(experiment_id = %experiment_id, error = %e, "Experiment event dropped");
            metrics::record_experiment_event_dropped();
        }
        result
    }

    pub async fn get_experiment_results(
        &self,
        experiment_id: &str,
    ) -> std::result::Result<ExperimentResults, ExperimentError> {
        self.framework
            .results
            .get_experiment_results(experiment_id)
            .await
    }

    pub async fn get_active_experiments(
        &self,
    ) -> std::result::Result<Vec<Experiment>, ExperimentError> {
        self.framework.experiments.get_active_experiments().await
    }

    /// Current live assignment, if any. Does not create one.
    pub async fn get_user_experiment_assignment(
        &self,
        user_id: &str,
    ) -> std::result::Result<Option<AssignmentResponse>, AssignmentError> {
        self.framework.assignments.get_assignment(user_id).await
    }

    async fn track_quietly(&self, event: ExperimentEvent) {
        let _ = self.track_experiment_event(event).await;
    }
}

/// Session from the request context, then the profile, else a fresh one
fn resolve_session_id(context: &RecommendationContext, profile: &UserProfile) -> String {
    context
        .session_id
        .iter()
        .chain(std::iter::once(&profile.session_id))
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("session-{}", Utc::now().timestamp_millis()))
}

pub fn compute_metrics(feedback: &[RecommendationFeedback]) -> RecommendationMetrics {
    let total = feedback.len();
    if total == 0 {
        return RecommendationMetrics::default();
    }

    let clicks = feedback.iter().filter(|f| f.clicked).count();
    let conversions = feedback.iter().filter(|f| f.converted).count();

    let ratings: Vec<f64> = feedback
        .iter()
        .filter(|f| f.rating > 0)
        .map(|f| f.rating as f64)
        .collect();
    let average_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<f64>() / ratings.len() as f64
    };

    RecommendationMetrics {
        total_recommendations: total,
        click_through_rate: clicks as f64 / total as f64 * 100.0,
        conversion_rate: conversions as f64 / total as f64 * 100.0,
        average_rating,
        accuracy_score: average_rating / 5.0 * 100.0,
    }
}

impl std::fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Log the effective configuration once at startup
pub fn log_config(config: &RecommendationConfig) {
    info!(
        default_count = config.default_count,
        ab_testing = config.enable_ab_testing,
        significance_threshold = config.significance_threshold,
        "Recommendation engine configured"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BehaviorAction, BudgetRange, ExperimentVariant, UserPreferences, VeteranProfile,
    };
    use chrono::Utc;

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            session_id: "session-1".to_string(),
            is_veteran: false,
            veteran_details: None,
            preferences: UserPreferences {
                budget_range: BudgetRange {
                    min: 25_000.0,
                    max: 75_000.0,
                },
                project_types: vec!["residential".to_string()],
                timeframe: String::new(),
                priorities: vec![],
                communication_style: Default::default(),
            },
            behavior_history: vec![],
            location: None,
            previous_projects: vec![],
        }
    }

    fn veteran(id: &str) -> UserProfile {
        let mut p = profile(id);
        p.is_veteran = true;
        p.veteran_details = Some(VeteranProfile {
            service_branch: "Army".to_string(),
            service_era: "OEF".to_string(),
            combat_veteran: true,
            disability_rating: None,
            special_programs: vec![],
            preferred_specialist: None,
        });
        p
    }

    fn feedback(user: &str, rating: u8, clicked: bool, converted: bool) -> RecommendationFeedback {
        RecommendationFeedback {
            recommendation_id: "rec-1".to_string(),
            user_id: user.to_string(),
            rating,
            clicked,
            converted,
            comment: None,
            timestamp: Utc::now(),
        }
    }

    fn engine() -> RecommendationEngine {
        RecommendationEngine::in_memory(RecommendationConfig::default())
    }

    fn single_variant_experiment(count: usize) -> ExperimentDefinition {
        let mut configuration = VariantConfiguration::default();
        configuration.recommendation_count = count;
        ExperimentDefinition {
            id: "rec_count".to_string(),
            name: "Recommendation count".to_string(),
            description: String::new(),
            variants: vec![ExperimentVariant {
                id: "short".to_string(),
                name: "Short list".to_string(),
                traffic_allocation: 100,
                is_control: true,
                configuration,
            }],
            start_date: Utc::now() - chrono::Duration::minutes(5),
            end_date: None,
            target_audience: Default::default(),
            sample_percent: 100,
            auto_start: true,
        }
    }

    #[test]
    fn test_compute_metrics_average_and_accuracy() {
        // ten ratings summing to 35
        let ratings = [5, 4, 3, 3, 4, 2, 5, 3, 3, 3];
        let log: Vec<RecommendationFeedback> = ratings
            .iter()
            .enumerate()
            .map(|(i, r)| feedback("u", *r, i < 4, i < 1))
            .collect();

        let metrics = compute_metrics(&log);
        assert_eq!(metrics.total_recommendations, 10);
        assert!((metrics.average_rating - 3.5).abs() < 1e-9);
        assert!((metrics.accuracy_score - 70.0).abs() < 1e-9);
        assert!((metrics.click_through_rate - 40.0).abs() < 1e-9);
        assert!((metrics.conversion_rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_metrics_ignores_unrated_entries() {
        let log = vec![feedback("u", 0, true, false), feedback("u", 4, false, false)];
        let metrics = compute_metrics(&log);
        assert_eq!(metrics.total_recommendations, 2);
        assert!((metrics.average_rating - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_metrics_empty_log() {
        assert_eq!(compute_metrics(&[]), RecommendationMetrics::default());
    }

    #[tokio::test]
    async fn test_veteran_scenario() {
        let engine = engine();
        let recs = engine
            .generate_recommendations(&veteran("vet-1"), None)
            .await;

        let kitchen = recs
            .iter()
            .find(|r| r.project_type == "kitchen")
            .expect("kitchen recommendation");
        assert!(kitchen.confidence >= 85);
        assert_eq!(kitchen.confidence, 93);
        assert!(kitchen.veteran_benefits.as_ref().unwrap().len() >= 3);

        for rec in &recs {
            assert!(rec.confidence <= 100);
            assert!(rec.veteran_benefits.as_ref().unwrap().len() >= 2);
        }
    }

    #[tokio::test]
    async fn test_results_are_sorted_and_bounded() {
        let engine = engine();
        let mut p = profile("user-1");
        p.preferences.project_types = vec![
            "residential".to_string(),
            "commercial".to_string(),
            "renovation".to_string(),
            "addition".to_string(),
        ];

        let recs = engine.generate_recommendations(&p, None).await;
        assert_eq!(recs.len(), 5);
        assert!(recs.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[tokio::test]
    async fn test_malformed_profile_gets_fallback() {
        let engine = engine();
        let mut p = veteran("vet-2");
        p.veteran_details = None;

        let batch = engine.generate_with_context(&p, None).await;
        assert!(batch.fallback);
        assert!(!batch.recommendations.is_empty());
        assert_eq!(batch.recommendations[0].id, fallback::FALLBACK_RECOMMENDATION_ID);
    }

    #[tokio::test]
    async fn test_inverted_budget_gets_fallback() {
        let engine = engine();
        let mut p = profile("user-2");
        p.preferences.budget_range = BudgetRange {
            min: 90_000.0,
            max: 10_000.0,
        };

        let recs = engine.generate_recommendations(&p, None).await;
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, fallback::FALLBACK_RECOMMENDATION_ID);
    }

    #[tokio::test]
    async fn test_variant_controls_list_length_and_context() {
        let engine = engine();
        engine
            .create_experiment(single_variant_experiment(1))
            .await
            .unwrap();

        let batch = engine
            .generate_with_context(&profile("user-3"), None)
            .await;
        assert_eq!(batch.recommendations.len(), 1);
        assert_eq!(
            batch
                .context
                .experiment_assignment
                .as_ref()
                .map(|a| a.variant_id.as_str()),
            Some("short")
        );
        assert_eq!(
            batch.context.variant_config.map(|c| c.recommendation_count),
            Some(1)
        );

        let results = engine.get_experiment_results("rec_count").await.unwrap();
        assert_eq!(results.variants[0].views, 1);
    }

    #[tokio::test]
    async fn test_feedback_never_creates_assignment() {
        let engine = engine();
        engine
            .create_experiment(single_variant_experiment(6))
            .await
            .unwrap();

        engine.record_feedback(feedback("stranger", 5, true, false)).await;

        assert!(engine
            .get_user_experiment_assignment("stranger")
            .await
            .unwrap()
            .is_none());
        let results = engine.get_experiment_results("rec_count").await.unwrap();
        assert_eq!(results.total_events, 0);
        assert_eq!(engine.get_metrics().await.unwrap().total_recommendations, 1);
    }

    #[tokio::test]
    async fn test_feedback_event_carries_project_type() {
        let engine = engine();
        engine
            .create_experiment(single_variant_experiment(6))
            .await
            .unwrap();

        let recs = engine
            .generate_recommendations(&profile("user-4"), None)
            .await;
        let mut fb = feedback("user-4", 4, true, false);
        fb.recommendation_id = recs[0].id.clone();
        engine.record_feedback(fb).await;

        let events = engine
            .framework()
            .tracker
            .events_for("rec_count")
            .await
            .unwrap();
        let feedback_event = events
            .iter()
            .find(|e| e.event_type == ExperimentEventType::Feedback)
            .unwrap();
        assert_eq!(
            feedback_event.metadata.get("project_type"),
            Some(&json!(recs[0].project_type))
        );
        assert_eq!(feedback_event.rating(), Some(4.0));

        let latest = engine.latest_feedback_for(&recs[0].id).await.unwrap();
        assert_eq!(latest.map(|f| f.rating), Some(4));
    }

    #[tokio::test]
    async fn test_behavior_requires_registration() {
        let engine = engine();
        let view = UserBehavior::new(BehaviorAction::View, Some("bathroom"));

        assert!(!engine.track_user_behavior("user-5", view.clone()).await);

        engine
            .generate_recommendations(&profile("user-5"), None)
            .await;
        assert!(engine.track_user_behavior("user-5", view).await);
    }

    #[tokio::test]
    async fn test_tracked_behavior_boosts_next_request() {
        let engine = engine();
        let p = profile("user-6");
        let before = engine.generate_recommendations(&p, None).await;
        let bathroom_before = before
            .iter()
            .find(|r| r.project_type == "bathroom")
            .unwrap()
            .confidence;

        for _ in 0..3 {
            engine
                .track_user_behavior(
                    "user-6",
                    UserBehavior::new(BehaviorAction::Estimate, Some("bathroom")),
                )
                .await;
        }

        let after = engine.generate_recommendations(&p, None).await;
        let bathroom_after = after
            .iter()
            .find(|r| r.project_type == "bathroom")
            .unwrap()
            .confidence;
        assert!(bathroom_after > bathroom_before);
    }

    fn confidence_of(recs: &[ProjectRecommendation], project_type: &str) -> u32 {
        recs.iter()
            .find(|r| r.project_type == project_type)
            .map(|r| r.confidence)
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_history_does_not_erase_tracked_behavior() {
        let engine = engine();
        let p = profile("user-7");
        engine.generate_recommendations(&p, None).await;

        for _ in 0..3 {
            engine
                .track_user_behavior(
                    "user-7",
                    UserBehavior::new(BehaviorAction::Estimate, Some("bathroom")),
                )
                .await;
        }
        let boosted = engine.generate_recommendations(&p, None).await;

        let mut with_view = p.clone();
        with_view.behavior_history = vec![UserBehavior::new(BehaviorAction::View, Some("kitchen"))];
        let recs = engine.generate_recommendations(&with_view, None).await;

        assert_eq!(
            confidence_of(&recs, "bathroom"),
            confidence_of(&boosted, "bathroom")
        );

        let stored = engine.profiles.get_profile("user-7").await.unwrap().unwrap();
        assert_eq!(stored.behavior_history.len(), 4);
    }

    #[tokio::test]
    async fn test_out_of_range_rating_is_rejected() {
        let engine = engine();

        let result = engine
            .try_record_feedback(feedback("user-8", 9, true, false))
            .await;
        assert!(matches!(result, Err(RecommendationError::InvalidFeedback(_))));

        engine.record_feedback(feedback("user-8", 9, true, false)).await;
        engine.record_feedback(feedback("user-8", 4, false, false)).await;

        let metrics = engine.get_metrics().await.unwrap();
        assert_eq!(metrics.total_recommendations, 1);
        assert!((metrics.average_rating - 4.0).abs() < 1e-9);
        assert!(metrics.accuracy_score <= 100.0);
    }

    #[tokio::test]
    async fn test_missing_session_gets_generated_id() {
        let engine = engine();
        engine
            .create_experiment(single_variant_experiment(6))
            .await
            .unwrap();

        let mut p = profile("user-9");
        p.session_id = String::new();
        let batch = engine.generate_with_context(&p, None).await;

        let session_id = batch.context.session_id.unwrap();
        assert!(session_id.starts_with("session-"));
        let assignment = batch.context.experiment_assignment.unwrap();
        assert_eq!(assignment.session_id, session_id);
    }

    #[tokio::test]
    async fn test_context_session_wins_over_profile() {
        let engine = engine();
        let context = RecommendationContext {
            session_id: Some("ctx-session".to_string()),
            ..RecommendationContext::default()
        };

        let batch = engine
            .generate_with_context(&profile("user-10"), Some(context))
            .await;
        assert_eq!(batch.context.session_id.as_deref(), Some("ctx-session"));
    }

    /// Assignment backend that is down
    struct UnavailableAssignments;

    #[async_trait::async_trait]
    impl crate::db::AssignmentStore for UnavailableAssignments {
        async fn get_assignment(
            &self,
            _user_id: &str,
            _experiment_id: &str,
        ) -> crate::db::StoreResult<Option<UserAssignment>> {
            Err(StoreError::Backend("assignments unavailable".to_string()))
        }

        async fn insert_if_absent(
            &self,
            _assignment: UserAssignment,
        ) -> crate::db::StoreResult<UserAssignment> {
            Err(StoreError::Backend("assignments unavailable".to_string()))
        }

        async fn count_assignments(&self, _experiment_id: &str) -> crate::db::StoreResult<usize> {
            Ok(0)
        }
    }

    fn counter_value(name: &str, status: &str) -> f64 {
        prometheus::gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .filter(|metric| metric.get_label().iter().any(|l| l.get_value() == status))
            .map(|metric| metric.get_counter().get_value())
            .sum()
    }

    #[tokio::test]
    async fn test_stored_feedback_is_not_counted_dropped() {
        let store = Arc::new(MemoryStore::new());
        let framework = ABTestingFramework::new(
            store.clone(),
            Arc::new(UnavailableAssignments),
            store.clone(),
            true,
            DEFAULT_SIGNIFICANCE_THRESHOLD,
        );
        let engine = RecommendationEngine::new(
            framework,
            store.clone(),
            store,
            Arc::new(TracingAnalyticsSink),
            RecommendationConfig::default(),
        );
        engine
            .create_experiment(single_variant_experiment(6))
            .await
            .unwrap();

        let dropped_before = counter_value("personalization_feedback_total", "dropped");
        engine.record_feedback(feedback("user-11", 5, true, false)).await;

        assert_eq!(
            counter_value("personalization_feedback_total", "dropped"),
            dropped_before
        );
        assert_eq!(engine.get_metrics().await.unwrap().total_recommendations, 1);
    }

    #[tokio::test]
    async fn test_behavior_writes_have_their_own_counter() {
        let engine = engine();
        engine
            .generate_recommendations(&profile("user-12"), None)
            .await;

        let recorded_before = counter_value("personalization_behavior_total", "recorded");
        assert!(
            engine
                .track_user_behavior(
                    "user-12",
                    UserBehavior::new(BehaviorAction::View, Some("deck")),
                )
                .await
        );
        assert!(counter_value("personalization_behavior_total", "recorded") >= recorded_before + 1.0);
    }
}
