//! Repository traits for engine state.
//!
//! The engine only talks to these traits so a deployment can swap the
//! in-memory store for a persistent, concurrency-safe backend.

pub mod memory;

pub use memory::MemoryStore;

use crate::models::{
    Experiment, ExperimentEvent, ExperimentStatus, ProjectRecommendation, RecommendationFeedback,
    UserAssignment, UserBehavior, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Insert a new experiment; fails with `Conflict` if the id is taken
    async fn insert_experiment(&self, experiment: Experiment) -> StoreResult<()>;

    async fn get_experiment(&self, experiment_id: &str) -> StoreResult<Option<Experiment>>;

    /// All experiments in creation order
    async fn list_experiments(&self) -> StoreResult<Vec<Experiment>>;

    async fn update_status(
        &self,
        experiment_id: &str,
        status: ExperimentStatus,
        winning_variant_id: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<Experiment>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignment(
        &self,
        user_id: &str,
        experiment_id: &str,
    ) -> StoreResult<Option<UserAssignment>>;

    /// Atomically store `assignment` unless one already exists for the
    /// (user, experiment) key. Returns whichever assignment is stored.
    async fn insert_if_absent(&self, assignment: UserAssignment) -> StoreResult<UserAssignment>;

    async fn count_assignments(&self, experiment_id: &str) -> StoreResult<usize>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_event(&self, event: ExperimentEvent) -> StoreResult<()>;

    async fn events_for_experiment(&self, experiment_id: &str)
        -> StoreResult<Vec<ExperimentEvent>>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append_feedback(&self, feedback: RecommendationFeedback) -> StoreResult<()>;

    async fn all_feedback(&self) -> StoreResult<Vec<RecommendationFeedback>>;

    /// Most recent feedback submitted for a recommendation
    async fn latest_feedback_for(
        &self,
        recommendation_id: &str,
    ) -> StoreResult<Option<RecommendationFeedback>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile or refresh the declared fields of a stored one.
    /// Incoming behavior is merged into the stored log, never replacing it.
    /// Returns the profile as stored.
    async fn register_profile(&self, profile: UserProfile) -> StoreResult<UserProfile>;

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>>;

    /// Append to a registered profile's history. Returns `false` when the
    /// user is not registered.
    async fn append_behavior(&self, user_id: &str, behavior: UserBehavior) -> StoreResult<bool>;

    async fn save_recommendations(
        &self,
        user_id: &str,
        recommendations: Vec<ProjectRecommendation>,
    ) -> StoreResult<()>;

    async fn last_recommendations(
        &self,
        user_id: &str,
    ) -> StoreResult<Option<Vec<ProjectRecommendation>>>;
}
