/// Assignment Service - Deterministic, sticky variant assignment
use crate::db::{AssignmentStore, ExperimentStore, StoreError};
use crate::metrics;
use crate::models::{
    Experiment, ExperimentVariant, TargetAudience, UserAssignment, UserProfile,
    VariantConfiguration,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Clone)]
pub struct AssignmentService {
    experiments: Arc<dyn ExperimentStore>,
    assignments: Arc<dyn AssignmentStore>,
    enabled: bool,
}

/// Assignment response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub experiment_id: String,
    pub user_id: String,
    pub variant_id: String,
    pub variant_name: String,
    pub session_id: String,
    pub assigned_at: DateTime<Utc>,
    pub config: VariantConfiguration,
}

impl AssignmentService {
    pub fn new(
        experiments: Arc<dyn ExperimentStore>,
        assignments: Arc<dyn AssignmentStore>,
        enabled: bool,
    ) -> Self {
        Self {
            experiments,
            assignments,
            enabled,
        }
    }

    /// Assign a visitor to a variant of the first live experiment they are
    /// eligible for. An existing assignment in any live experiment wins.
    pub async fn assign_user_to_experiment(
        &self,
        user_id: &str,
        session_id: &str,
        profile: Option<&UserProfile>,
    ) -> Result<Option<UserAssignment>, AssignmentError> {
        if !self.enabled {
            return Ok(None);
        }

        let live = self.live_experiments().await?;

        // 1. Sticky: reuse any assignment in a live experiment
        for experiment in &live {
            if let Some(existing) = self
                .assignments
                .get_assignment(user_id, &experiment.id)
                .await?
            {
                tracing::debug!(
                    user_id = %user_id,
                    experiment_id = %experiment.id,
                    variant_id = %existing.variant_id,
                    "Existing assignment reused"
                );
                return Ok(Some(existing));
            }
        }

        // 2. Bucket into the first experiment the visitor qualifies for
        for experiment in &live {
            if !is_in_audience(experiment.target_audience, profile) {
                continue;
            }
            if !is_user_sampled(&experiment.id, user_id, experiment.sample_percent) {
                continue;
            }

            let variant = select_variant(&experiment.id, user_id, &experiment.variants)
                .ok_or_else(|| AssignmentError::NoVariants(experiment.id.clone()))?;

            let candidate = UserAssignment {
                user_id: user_id.to_string(),
                experiment_id: experiment.id.clone(),
                variant_id: variant.id.clone(),
                session_id: session_id.to_string(),
                assigned_at: Utc::now(),
            };

            // Concurrent first requests converge on whichever insert landed first
            let stored = self.assignments.insert_if_absent(candidate.clone()).await?;
            if stored == candidate {
                metrics::record_assignment_created();
                tracing::info!(
                    user_id = %user_id,
                    experiment_id = %experiment.id,
                    variant_id = %stored.variant_id,
                    "Assigned user to variant '{}' in experiment {}",
                    variant.name,
                    experiment.name
                );
            }

            return Ok(Some(stored));
        }

        Ok(None)
    }

    /// Current assignment in a live experiment, without creating one
    pub async fn current_assignment(
        &self,
        user_id: &str,
    ) -> Result<Option<(UserAssignment, Experiment)>, AssignmentError> {
        if !self.enabled {
            return Ok(None);
        }

        for experiment in self.live_experiments().await? {
            if let Some(assignment) = self
                .assignments
                .get_assignment(user_id, &experiment.id)
                .await?
            {
                return Ok(Some((assignment, experiment)));
            }
        }

        Ok(None)
    }

    /// Current live assignment with its variant, read-only
    pub async fn get_assignment(
        &self,
        user_id: &str,
    ) -> Result<Option<AssignmentResponse>, AssignmentError> {
        let Some((assignment, experiment)) = self.current_assignment(user_id).await? else {
            return Ok(None);
        };

        let variant = experiment
            .variant(&assignment.variant_id)
            .ok_or_else(|| AssignmentError::VariantNotFound(assignment.variant_id.clone()))?;

        Ok(Some(AssignmentResponse {
            experiment_id: assignment.experiment_id,
            user_id: assignment.user_id,
            variant_id: assignment.variant_id,
            variant_name: variant.name.clone(),
            session_id: assignment.session_id,
            assigned_at: assignment.assigned_at,
            config: variant.configuration.clone(),
        }))
    }

    /// Configuration of the visitor's current live variant
    pub async fn get_variant_configuration(
        &self,
        user_id: &str,
    ) -> Result<Option<VariantConfiguration>, AssignmentError> {
        Ok(self
            .current_assignment(user_id)
            .await?
            .and_then(|(assignment, experiment)| {
                experiment
                    .variant(&assignment.variant_id)
                    .map(|v| v.configuration.clone())
            }))
    }

    pub async fn assigned_user_count(&self, experiment_id: &str) -> Result<usize, AssignmentError> {
        Ok(self.assignments.count_assignments(experiment_id).await?)
    }

    async fn live_experiments(&self) -> Result<Vec<Experiment>, AssignmentError> {
        let now = Utc::now();
        Ok(self
            .experiments
            .list_experiments()
            .await?
            .into_iter()
            .filter(|e| e.is_live(now))
            .collect())
    }
}

/// Bucket in [0, 100) from SHA-256 over `prefix:experiment:user`.
/// The first 8 digest bytes are read as a big-endian u64.
pub fn stable_bucket(prefix: &str, experiment_id: &str, user_id: &str) -> u8 {
    let digest = Sha256::digest(format!("{}:{}:{}", prefix, experiment_id, user_id).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % 100) as u8
}

/// Check if user falls within the experiment sample
pub fn is_user_sampled(experiment_id: &str, user_id: &str, sample_percent: u8) -> bool {
    if sample_percent >= 100 {
        return true;
    }
    if sample_percent == 0 {
        return false;
    }

    stable_bucket("sample", experiment_id, user_id) < sample_percent
}

/// Select variant using the visitor's bucket and cumulative traffic allocation
pub fn select_variant<'a>(
    experiment_id: &str,
    user_id: &str,
    variants: &'a [ExperimentVariant],
) -> Option<&'a ExperimentVariant> {
    let bucket = stable_bucket("variant", experiment_id, user_id) as u32;

    let mut cumulative = 0u32;
    for variant in variants {
        cumulative += variant.traffic_allocation as u32;
        if bucket < cumulative {
            return Some(variant);
        }
    }

    // Unreachable when allocations sum to 100
    variants.last()
}

pub fn is_in_audience(audience: TargetAudience, profile: Option<&UserProfile>) -> bool {
    match audience {
        TargetAudience::All => true,
        TargetAudience::VeteransOnly => profile.map_or(false, |p| p.is_veteran),
        TargetAudience::NonVeterans => profile.map_or(true, |p| !p.is_veteran),
    }
}

/// Assignment service errors
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("No variants defined for experiment: {0}")]
    NoVariants(String),

    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
