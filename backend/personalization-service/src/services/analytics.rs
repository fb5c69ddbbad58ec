//! Analytics beacons
//!
//! Fire-and-forget events for the site analytics pipeline. Sinks must not
//! block and must not fail the caller.

use serde::Serialize;
use serde_json::Value;

pub const RECOMMENDATIONS_GENERATED: &str = "recommendations_generated";
pub const RECOMMENDATION_FEEDBACK: &str = "recommendation_feedback";

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    pub properties: Value,
}

impl AnalyticsEvent {
    pub fn new(name: &'static str, properties: Value) -> Self {
        Self { name, properties }
    }
}

pub trait AnalyticsSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// Default sink: one `tracing` event per beacon on the `analytics` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn emit(&self, event: AnalyticsEvent) {
        tracing::info!(
            target: "analytics",
            event = event.name,
            properties = %event.properties,
            "analytics event"
        );
    }
}
