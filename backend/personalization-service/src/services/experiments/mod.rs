/// A/B Testing Framework - Core Services
pub mod assignment;
pub mod experiment_service;
pub mod results;
pub mod significance;
pub mod tracking;

pub use assignment::{AssignmentError, AssignmentResponse, AssignmentService};
pub use experiment_service::{ExperimentError, ExperimentService};
pub use results::{ExperimentResults, ResultsService, VariantResults};
pub use significance::{SignificanceResult, DEFAULT_SIGNIFICANCE_THRESHOLD};
pub use tracking::EventTracker;

use crate::db::{AssignmentStore, EventStore, ExperimentStore};
use std::sync::Arc;

/// Experiment registry, assignment, event log and results behind one handle
#[derive(Clone)]
pub struct ABTestingFramework {
    pub experiments: ExperimentService,
    pub assignments: AssignmentService,
    pub tracker: EventTracker,
    pub results: ResultsService,
}

impl ABTestingFramework {
    pub fn new(
        experiments: Arc<dyn ExperimentStore>,
        assignments: Arc<dyn AssignmentStore>,
        events: Arc<dyn EventStore>,
        enabled: bool,
        significance_threshold: f64,
    ) -> Self {
        Self {
            experiments: ExperimentService::new(experiments.clone()),
            assignments: AssignmentService::new(experiments.clone(), assignments.clone(), enabled),
            tracker: EventTracker::new(experiments.clone(), events.clone()),
            results: ResultsService::new(experiments, assignments, events, significance_threshold),
        }
    }
}
