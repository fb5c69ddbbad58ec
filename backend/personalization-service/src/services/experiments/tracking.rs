/// Event Tracker - Append-only experiment event log
use super::experiment_service::ExperimentError;
use crate::db::{EventStore, ExperimentStore};
use crate::metrics;
use crate::models::ExperimentEvent;
use std::sync::Arc;

#[derive(Clone)]
pub struct EventTracker {
    experiments: Arc<dyn ExperimentStore>,
    events: Arc<dyn EventStore>,
}

impl EventTracker {
    pub fn new(experiments: Arc<dyn ExperimentStore>, events: Arc<dyn EventStore>) -> Self {
        Self {
            experiments,
            events,
        }
    }

    /// Record an event; the experiment and the variant must exist
    pub async fn track_event(&self, event: ExperimentEvent) -> Result<(), ExperimentError> {
        let experiment = self
            .experiments
            .get_experiment(&event.experiment_id)
            .await?
            .ok_or_else(|| ExperimentError::NotFound(event.experiment_id.clone()))?;

        if experiment.variant(&event.variant_id).is_none() {
            return Err(ExperimentError::VariantNotFound {
                experiment_id: event.experiment_id.clone(),
                variant_id: event.variant_id.clone(),
            });
        }

        let event_type = event.event_type;
        tracing::debug!(
            experiment_id = %event.experiment_id,
            variant_id = %event.variant_id,
            user_id = %event.user_id,
            event_type = event_type.as_str(),
            "Tracking experiment event"
        );

        self.events.append_event(event).await?;
        metrics::record_experiment_event(event_type.as_str());

        Ok(())
    }

    pub async fn events_for(
        &self,
        experiment_id: &str,
    ) -> Result<Vec<ExperimentEvent>, ExperimentError> {
        Ok(self.events.events_for_experiment(experiment_id).await?)
    }
}
