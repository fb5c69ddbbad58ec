//! In-memory repository backing all engine stores.

use super::{
    AssignmentStore, EventStore, ExperimentStore, FeedbackStore, ProfileStore, StoreError,
    StoreResult,
};
use crate::models::{
    Experiment, ExperimentEvent, ExperimentStatus, ProjectRecommendation, RecommendationFeedback,
    UserAssignment, UserBehavior, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// Process-local store. Assignment creation goes through `DashMap::entry`,
/// which holds the shard lock across the check and the insert.
#[derive(Default)]
pub struct MemoryStore {
    experiments: RwLock<Vec<Experiment>>,
    assignments: DashMap<(String, String), UserAssignment>,
    events: RwLock<Vec<ExperimentEvent>>,
    feedback: RwLock<Vec<RecommendationFeedback>>,
    learning: DashMap<String, RecommendationFeedback>,
    profiles: DashMap<String, UserProfile>,
    recommendations: DashMap<String, Vec<ProjectRecommendation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExperimentStore for MemoryStore {
    async fn insert_experiment(&self, experiment: Experiment) -> StoreResult<()> {
        let mut experiments = self.experiments.write().await;
        if experiments.iter().any(|e| e.id == experiment.id) {
            return Err(StoreError::Conflict(format!("experiment {}", experiment.id)));
        }
        experiments.push(experiment);
        Ok(())
    }

    async fn get_experiment(&self, experiment_id: &str) -> StoreResult<Option<Experiment>> {
        Ok(self
            .experiments
            .read()
            .await
            .iter()
            .find(|e| e.id == experiment_id)
            .cloned())
    }

    async fn list_experiments(&self) -> StoreResult<Vec<Experiment>> {
        Ok(self.experiments.read().await.clone())
    }

    async fn update_status(
        &self,
        experiment_id: &str,
        status: ExperimentStatus,
        winning_variant_id: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<Experiment> {
        let mut experiments = self.experiments.write().await;
        let experiment = experiments
            .iter_mut()
            .find(|e| e.id == experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment {}", experiment_id)))?;

        experiment.status = status;
        if status == ExperimentStatus::Concluded {
            experiment.concluded_at = Some(at);
            experiment.winning_variant_id = winning_variant_id;
        }

        Ok(experiment.clone())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn get_assignment(
        &self,
        user_id: &str,
        experiment_id: &str,
    ) -> StoreResult<Option<UserAssignment>> {
        let key = (user_id.to_string(), experiment_id.to_string());
        Ok(self.assignments.get(&key).map(|entry| entry.value().clone()))
    }

    async fn insert_if_absent(&self, assignment: UserAssignment) -> StoreResult<UserAssignment> {
        let key = (assignment.user_id.clone(), assignment.experiment_id.clone());
        let stored = self.assignments.entry(key).or_insert(assignment);
        Ok(stored.value().clone())
    }

    async fn count_assignments(&self, experiment_id: &str) -> StoreResult<usize> {
        Ok(self
            .assignments
            .iter()
            .filter(|entry| entry.key().1 == experiment_id)
            .count())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, event: ExperimentEvent) -> StoreResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn events_for_experiment(
        &self,
        experiment_id: &str,
    ) -> StoreResult<Vec<ExperimentEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.experiment_id == experiment_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn append_feedback(&self, feedback: RecommendationFeedback) -> StoreResult<()> {
        self.learning
            .insert(feedback.recommendation_id.clone(), feedback.clone());
        self.feedback.write().await.push(feedback);
        Ok(())
    }

    async fn all_feedback(&self) -> StoreResult<Vec<RecommendationFeedback>> {
        Ok(self.feedback.read().await.clone())
    }

    async fn latest_feedback_for(
        &self,
        recommendation_id: &str,
    ) -> StoreResult<Option<RecommendationFeedback>> {
        Ok(self
            .learning
            .get(recommendation_id)
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn register_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        match self.profiles.entry(profile.id.clone()) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                let mut history = std::mem::take(&mut stored.behavior_history);
                for behavior in profile.behavior_history {
                    if !history.contains(&behavior) {
                        history.push(behavior);
                    }
                }
                *stored = UserProfile {
                    behavior_history: history,
                    ..profile
                };
                Ok(stored.clone())
            }
            Entry::Vacant(entry) => Ok(entry.insert(profile).value().clone()),
        }
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn append_behavior(&self, user_id: &str, behavior: UserBehavior) -> StoreResult<bool> {
        match self.profiles.get_mut(user_id) {
            Some(mut profile) => {
                profile.behavior_history.push(behavior);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_recommendations(
        &self,
        user_id: &str,
        recommendations: Vec<ProjectRecommendation>,
    ) -> StoreResult<()> {
        self.recommendations
            .insert(user_id.to_string(), recommendations);
        Ok(())
    }

    async fn last_recommendations(
        &self,
        user_id: &str,
    ) -> StoreResult<Option<Vec<ProjectRecommendation>>> {
        Ok(self
            .recommendations
            .get(user_id)
            .map(|entry| entry.value().clone()))
    }
}
