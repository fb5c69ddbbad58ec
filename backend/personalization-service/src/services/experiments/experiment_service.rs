/// Experiment Service - Lifecycle management for A/B tests
use crate::db::{ExperimentStore, StoreError};
use crate::models::{Experiment, ExperimentDefinition, ExperimentStatus};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct ExperimentService {
    store: Arc<dyn ExperimentStore>,
}

impl ExperimentService {
    pub fn new(store: Arc<dyn ExperimentStore>) -> Self {
        Self { store }
    }

    /// Register a new experiment (active unless `auto_start` is false)
    pub async fn create_experiment(
        &self,
        definition: ExperimentDefinition,
    ) -> Result<Experiment, ExperimentError> {
        validate_definition(&definition)?;

        let experiment = Experiment::from_definition(definition, Utc::now());
        match self.store.insert_experiment(experiment.clone()).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(ExperimentError::DuplicateId(experiment.id.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            experiment_id = %experiment.id,
            variants = experiment.variants.len(),
            status = experiment.status.as_str(),
            "Created experiment: {}",
            experiment.name
        );

        Ok(experiment)
    }

    pub async fn get_experiment(&self, id: &str) -> Result<Experiment, ExperimentError> {
        self.store
            .get_experiment(id)
            .await?
            .ok_or_else(|| ExperimentError::NotFound(id.to_string()))
    }

    pub async fn list_experiments(&self) -> Result<Vec<Experiment>, ExperimentError> {
        Ok(self.store.list_experiments().await?)
    }

    /// Experiments whose status is active, in creation order
    pub async fn get_active_experiments(&self) -> Result<Vec<Experiment>, ExperimentError> {
        Ok(self
            .store
            .list_experiments()
            .await?
            .into_iter()
            .filter(|e| e.status == ExperimentStatus::Active)
            .collect())
    }

    /// Active experiments currently inside their activity window
    pub async fn get_live_experiments(&self) -> Result<Vec<Experiment>, ExperimentError> {
        let now = Utc::now();
        Ok(self
            .store
            .list_experiments()
            .await?
            .into_iter()
            .filter(|e| e.is_live(now))
            .collect())
    }

    /// Start an experiment (draft -> active)
    pub async fn start_experiment(&self, id: &str) -> Result<Experiment, ExperimentError> {
        let experiment = self.get_experiment(id).await?;

        match experiment.status {
            ExperimentStatus::Draft => {
                let updated = self
                    .store
                    .update_status(id, ExperimentStatus::Active, None, Utc::now())
                    .await?;
                tracing::info!(experiment_id = %id, "Started experiment: {}", updated.name);
                Ok(updated)
            }
            status => Err(ExperimentError::InvalidStateTransition {
                from: status.as_str().to_string(),
                to: ExperimentStatus::Active.as_str().to_string(),
            }),
        }
    }

    /// Conclude an experiment (draft/active -> concluded). Concluding a
    /// draft cancels it before it ever receives traffic.
    pub async fn conclude_experiment(
        &self,
        id: &str,
        winning_variant_id: Option<String>,
    ) -> Result<Experiment, ExperimentError> {
        let experiment = self.get_experiment(id).await?;

        if experiment.status == ExperimentStatus::Concluded {
            return Err(ExperimentError::InvalidStateTransition {
                from: ExperimentStatus::Concluded.as_str().to_string(),
                to: ExperimentStatus::Concluded.as_str().to_string(),
            });
        }

        if let Some(winner) = &winning_variant_id {
            if experiment.variant(winner).is_none() {
                return Err(ExperimentError::Validation(format!(
                    "Winning variant '{}' is not part of experiment {}",
                    winner, id
                )));
            }
        }

        let updated = self
            .store
            .update_status(
                id,
                ExperimentStatus::Concluded,
                winning_variant_id.clone(),
                Utc::now(),
            )
            .await?;

        tracing::info!(
            experiment_id = %id,
            winning_variant = ?winning_variant_id,
            "Concluded experiment: {}",
            updated.name
        );

        Ok(updated)
    }
}

/// Validate a create request
pub fn validate_definition(definition: &ExperimentDefinition) -> Result<(), ExperimentError> {
    if definition.id.trim().is_empty() {
        return Err(ExperimentError::Validation(
            "Experiment id cannot be empty".to_string(),
        ));
    }

    if definition.name.trim().is_empty() {
        return Err(ExperimentError::Validation(
            "Experiment name cannot be empty".to_string(),
        ));
    }

    if definition.sample_percent > 100 {
        return Err(ExperimentError::Validation(
            "Sample percent must be between 0 and 100".to_string(),
        ));
    }

    if let Some(end) = definition.end_date {
        if end <= definition.start_date {
            return Err(ExperimentError::Validation(format!(
                "End date {} must be after start date {}",
                end, definition.start_date
            )));
        }
    }

    if definition.variants.is_empty() {
        return Err(ExperimentError::Validation(
            "At least one variant is required".to_string(),
        ));
    }

    let mut ids = HashSet::new();
    for variant in &definition.variants {
        if variant.id.trim().is_empty() {
            return Err(ExperimentError::Validation(
                "Variant id cannot be empty".to_string(),
            ));
        }
        if !ids.insert(variant.id.as_str()) {
            return Err(ExperimentError::Validation(format!(
                "Duplicate variant id: {}",
                variant.id
            )));
        }
        if variant.traffic_allocation > 100 {
            return Err(ExperimentError::Validation(format!(
                "Variant '{}' traffic must be between 0 and 100",
                variant.id
            )));
        }
        if variant.configuration.recommendation_count == 0 {
            return Err(ExperimentError::Validation(format!(
                "Variant '{}' must return at least one recommendation",
                variant.id
            )));
        }
    }

    let total_allocation: u32 = definition
        .variants
        .iter()
        .map(|v| v.traffic_allocation as u32)
        .sum();
    if total_allocation != 100 {
        return Err(ExperimentError::Validation(format!(
            "Total traffic allocation must equal 100%, got {}%",
            total_allocation
        )));
    }

    let controls = definition.variants.iter().filter(|v| v.is_control).count();
    if controls > 1 {
        return Err(ExperimentError::Validation(format!(
            "At most one control variant is allowed, got {}",
            controls
        )));
    }

    Ok(())
}

/// Experiment service errors
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("Experiment not found: {0}")]
    NotFound(String),

    #[error("Duplicate experiment id: {0}")]
    DuplicateId(String),

    #[error("Variant {variant_id} not found in experiment {experiment_id}")]
    VariantNotFound {
        experiment_id: String,
        variant_id: String,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
