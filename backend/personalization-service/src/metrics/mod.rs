//! Personalization Metrics
//!
//! Prometheus metrics for recommendation serving, feedback capture and
//! experiment traffic.

use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Duration;

static RECOMMENDATIONS_SERVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "personalization_recommendations_served_total",
        "Recommendation lists served (engine/fallback)",
        &["source"]
    )
    .expect("Failed to register recommendations served metric")
});

static FEEDBACK_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "personalization_feedback_total",
        "Feedback writes (recorded/rejected/dropped)",
        &["status"]
    )
    .expect("Failed to register feedback metric")
});

static BEHAVIOR_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "personalization_behavior_total",
        "Behavior writes (recorded/dropped)",
        &["status"]
    )
    .expect("Failed to register behavior metric")
});

static EXPERIMENT_EVENTS_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "personalization_experiment_events_dropped_total",
        "Experiment events that could not be stored"
    )
    .expect("Failed to register dropped experiment events metric")
});

static EXPERIMENT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "personalization_experiment_events_total",
        "Experiment events tracked by type",
        &["event_type"]
    )
    .expect("Failed to register experiment events metric")
});

static ASSIGNMENTS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "personalization_assignments_created_total",
        "New experiment assignments"
    )
    .expect("Failed to register assignments metric")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "personalization_http_request_duration_seconds",
        "HTTP request latencies for personalization-service",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register HTTP duration metric")
});

/// Record a served list by source (engine/fallback)
pub fn record_recommendations_served(source: &str) {
    RECOMMENDATIONS_SERVED_TOTAL
        .with_label_values(&[source])
        .inc();
}

/// Record a feedback write outcome (recorded/rejected/dropped)
pub fn record_feedback(status: &str) {
    FEEDBACK_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_behavior(status: &str) {
    BEHAVIOR_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_experiment_event_dropped() {
    EXPERIMENT_EVENTS_DROPPED_TOTAL.inc();
}

pub fn record_experiment_event(event_type: &str) {
    EXPERIMENT_EVENTS_TOTAL
        .with_label_values(&[event_type])
        .inc();
}

pub fn record_assignment_created() {
    ASSIGNMENTS_CREATED_TOTAL.inc();
}

pub fn observe_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status.to_string()])
        .observe(duration.as_secs_f64());
}

/// Prometheus text exposition
pub async fn serve_metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "Failed to encode metrics");
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_gathered() {
        record_recommendations_served("engine");
        record_feedback("recorded");
        record_behavior("recorded");
        record_experiment_event("view");
        record_experiment_event_dropped();
        record_assignment_created();

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.contains(&"personalization_recommendations_served_total".to_string()));
        assert!(names.contains(&"personalization_feedback_total".to_string()));
        assert!(names.contains(&"personalization_behavior_total".to_string()));
        assert!(names.contains(&"personalization_experiment_events_dropped_total".to_string()));
        assert!(names.contains(&"personalization_experiment_events_total".to_string()));
        assert!(names.contains(&"personalization_assignments_created_total".to_string()));
    }
}
