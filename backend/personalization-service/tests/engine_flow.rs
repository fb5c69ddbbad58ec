use chrono::Utc;
use personalization_service::models::{
    BudgetRange, ExperimentDefinition, ExperimentEvent, ExperimentEventType, ExperimentVariant,
    RecommendationFeedback, TargetAudience, UserPreferences, UserProfile, VariantConfiguration,
    VeteranProfile,
};
use personalization_service::services::analytics::{AnalyticsEvent, AnalyticsSink};
use personalization_service::services::experiments::ExperimentError;
use personalization_service::{RecommendationConfig, RecommendationEngine};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl AnalyticsSink for RecordingSink {
    fn emit(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn visitor(id: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        session_id: format!("session-{}", id),
        is_veteran: false,
        veteran_details: None,
        preferences: UserPreferences {
            budget_range: BudgetRange {
                min: 25_000.0,
                max: 75_000.0,
            },
            project_types: vec!["residential".to_string()],
            timeframe: "within a month".to_string(),
            priorities: vec![],
            communication_style: Default::default(),
        },
        behavior_history: vec![],
        location: Some("Bend, OR".to_string()),
        previous_projects: vec![],
    }
}

fn veteran_visitor(id: &str) -> UserProfile {
    let mut profile = visitor(id);
    profile.is_veteran = true;
    profile.veteran_details = Some(VeteranProfile {
        service_branch: "Marine Corps".to_string(),
        service_era: "Gulf War".to_string(),
        combat_veteran: false,
        disability_rating: Some(30),
        special_programs: vec![],
        preferred_specialist: None,
    });
    profile
}

fn variant(id: &str, allocation: u8, is_control: bool) -> ExperimentVariant {
    ExperimentVariant {
        id: id.to_string(),
        name: id.to_string(),
        traffic_allocation: allocation,
        is_control,
        configuration: VariantConfiguration::default(),
    }
}

fn split_test(id: &str) -> ExperimentDefinition {
    ExperimentDefinition {
        id: id.to_string(),
        name: "Budget-aware candidates".to_string(),
        description: "Standard vs budget-aware generation".to_string(),
        variants: vec![variant("control", 50, true), {
            let mut v = variant("budget_aware", 50, false);
            v.configuration.algorithm_type = personalization_service::models::AlgorithmType::BudgetAware;
            v
        }],
        start_date: Utc::now() - chrono::Duration::minutes(1),
        end_date: None,
        target_audience: TargetAudience::All,
        sample_percent: 100,
        auto_start: true,
    }
}

#[tokio::test]
async fn test_split_test_end_to_end() {
    let engine = RecommendationEngine::in_memory(RecommendationConfig::default());
    engine.create_experiment(split_test("split")).await.unwrap();

    let mut per_variant: HashMap<String, usize> = HashMap::new();
    for i in 0..400 {
        let user_id = format!("visitor-{}", i);
        engine.generate_recommendations(&visitor(&user_id), None).await;

        let assignment = engine
            .get_user_experiment_assignment(&user_id)
            .await
            .unwrap()
            .expect("every visitor is enrolled");
        *per_variant.entry(assignment.variant_id.clone()).or_default() += 1;

        // control converts 5%, treatment 25%
        let converts = if assignment.variant_id == "control" {
            i % 20 == 0
        } else {
            i % 4 == 0
        };
        if converts {
            let event = ExperimentEvent {
                id: uuid::Uuid::new_v4(),
                experiment_id: "split".to_string(),
                variant_id: assignment.variant_id.clone(),
                user_id: user_id.clone(),
                event_type: ExperimentEventType::Conversion,
                timestamp: Utc::now(),
                metadata: HashMap::new(),
            };
            engine.track_experiment_event(event).await.unwrap();
        }
    }

    let control_users = per_variant["control"];
    assert!((160..=240).contains(&control_users), "control got {}", control_users);

    let results = engine.get_experiment_results("split").await.unwrap();
    assert_eq!(results.total_assigned, 400);
    let total_views: u64 = results.variants.iter().map(|v| v.views).sum();
    assert_eq!(total_views, 400);

    assert_eq!(results.significance.len(), 1);
    let significance = &results.significance[0];
    assert_eq!(significance.variant_id, "budget_aware");
    assert!(significance.variant_rate > significance.control_rate);
    assert!(significance.is_significant);
}

#[tokio::test]
async fn test_assignment_is_sticky_across_requests() {
    let engine = RecommendationEngine::in_memory(RecommendationConfig::default());
    engine.create_experiment(split_test("sticky")).await.unwrap();

    engine.generate_recommendations(&visitor("v-1"), None).await;
    let first = engine
        .get_user_experiment_assignment("v-1")
        .await
        .unwrap()
        .unwrap();

    for _ in 0..5 {
        engine.generate_recommendations(&visitor("v-1"), None).await;
    }
    let later = engine
        .get_user_experiment_assignment("v-1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.variant_id, later.variant_id);
    assert_eq!(first.assigned_at, later.assigned_at);

    let results = engine.get_experiment_results("sticky").await.unwrap();
    assert_eq!(results.total_assigned, 1);
}

#[tokio::test]
async fn test_concurrent_first_requests_share_a_variant() {
    let engine = Arc::new(RecommendationEngine::in_memory(
        RecommendationConfig::default(),
    ));
    engine.create_experiment(split_test("race")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let batch = engine.generate_with_context(&visitor("racer"), None).await;
            batch.context.experiment_assignment.map(|a| a.variant_id)
        }));
    }

    let mut variants = Vec::new();
    for handle in handles {
        variants.push(handle.await.unwrap().unwrap());
    }
    variants.dedup();
    assert_eq!(variants.len(), 1);

    let results = engine.get_experiment_results("race").await.unwrap();
    assert_eq!(results.total_assigned, 1);
}

#[tokio::test]
async fn test_concluded_experiment_stops_bucketing() {
    let engine = RecommendationEngine::in_memory(RecommendationConfig::default());
    engine.create_experiment(split_test("done")).await.unwrap();
    engine
        .conclude_experiment("done", Some("control".to_string()))
        .await
        .unwrap();

    let batch = engine.generate_with_context(&visitor("late"), None).await;
    assert!(batch.context.experiment_assignment.is_none());
    assert!(engine.get_active_experiments().await.unwrap().is_empty());

    let again = engine.conclude_experiment("done", None).await;
    assert!(matches!(
        again,
        Err(ExperimentError::InvalidStateTransition { .. })
    ));
}

#[tokio::test]
async fn test_veterans_only_experiment_skips_civilians() {
    let engine = RecommendationEngine::in_memory(RecommendationConfig::default());
    let mut definition = split_test("vets");
    definition.target_audience = TargetAudience::VeteransOnly;
    engine.create_experiment(definition).await.unwrap();

    engine.generate_recommendations(&visitor("civilian"), None).await;
    engine
        .generate_recommendations(&veteran_visitor("veteran"), None)
        .await;

    assert!(engine
        .get_user_experiment_assignment("civilian")
        .await
        .unwrap()
        .is_none());
    assert!(engine
        .get_user_experiment_assignment("veteran")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_disabled_ab_testing_uses_defaults() {
    let config = RecommendationConfig {
        default_count: 1,
        enable_ab_testing: false,
        ..RecommendationConfig::default()
    };
    let engine = RecommendationEngine::in_memory(config);
    engine.create_experiment(split_test("off")).await.unwrap();

    let batch = engine.generate_with_context(&visitor("v"), None).await;
    assert_eq!(batch.recommendations.len(), 1);
    assert!(batch.context.experiment_assignment.is_none());
}

#[tokio::test]
async fn test_veteran_with_disability_gets_accessibility_financing() {
    let engine = RecommendationEngine::in_memory(RecommendationConfig::default());
    let recs = engine
        .generate_recommendations(&veteran_visitor("marine"), None)
        .await;

    assert!(!recs.is_empty());
    for rec in &recs {
        let benefits = rec.veteran_benefits.as_ref().unwrap();
        assert_eq!(benefits.len(), 4);
        assert_eq!(benefits[2].title, "Marine Corps Veteran Specialist");
        assert!(rec.confidence <= 100);
    }
}

#[tokio::test]
async fn test_analytics_beacons_are_emitted() {
    let sink = Arc::new(RecordingSink::default());
    let engine =
        RecommendationEngine::in_memory_with_sink(RecommendationConfig::default(), sink.clone());

    let recs = engine.generate_recommendations(&visitor("v"), None).await;
    engine
        .record_feedback(RecommendationFeedback {
            recommendation_id: recs[0].id.clone(),
            user_id: "v".to_string(),
            rating: 5,
            clicked: true,
            converted: false,
            comment: None,
            timestamp: Utc::now(),
        })
        .await;

    let names: Vec<&str> = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["recommendations_generated", "recommendation_feedback"]);

    let metrics = engine.get_metrics().await.unwrap();
    assert_eq!(metrics.total_recommendations, 1);
    assert_eq!(metrics.click_through_rate, 100.0);
    assert_eq!(metrics.accuracy_score, 100.0);
}
