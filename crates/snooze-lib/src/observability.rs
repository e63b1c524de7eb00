//! Observability infrastructure
//!
//! Provides:
//! - Prometheus metrics (transitions, wake gate decisions, run latency)
//! - Structured JSON logging with tracing

use crate::models::{Action, DesiredState, WorkloadRef};
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for a full pipeline run (in seconds)
const RUN_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SnoozeMetricsInner> = OnceLock::new();

struct SnoozeMetricsInner {
    transitions: IntCounterVec,
    wake_requests: IntCounterVec,
    run_duration_seconds: HistogramVec,
    run_failures: IntCounterVec,
}

impl SnoozeMetricsInner {
    fn new() -> Self {
        Self {
            transitions: register_int_counter_vec!(
                "kubesnooze_transitions_total",
                "Workload transitions decided by the engine",
                &["kind", "action", "outcome"]
            )
            .expect("Failed to register transitions_total"),

            wake_requests: register_int_counter_vec!(
                "kubesnooze_wake_requests_total",
                "Requests seen by the wake gate",
                &["result"]
            )
            .expect("Failed to register wake_requests_total"),

            run_duration_seconds: register_histogram_vec!(
                "kubesnooze_run_duration_seconds",
                "Time spent running a full sleep or wake pipeline",
                &["action"],
                RUN_BUCKETS.to_vec()
            )
            .expect("Failed to register run_duration_seconds"),

            run_failures: register_int_counter_vec!(
                "kubesnooze_run_failures_total",
                "Pipeline runs that ended in an error",
                &["action", "category"]
            )
            .expect("Failed to register run_failures_total"),
        }
    }
}

/// Handle to the process-wide metrics. Clones share the same metrics.
#[derive(Clone)]
pub struct SnoozeMetrics {
    _private: (),
}

impl Default for SnoozeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SnoozeMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SnoozeMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SnoozeMetricsInner {
        GLOBAL_METRICS.get_or_init(SnoozeMetricsInner::new)
    }

    pub fn inc_transition(&self, workload: &WorkloadRef, action: Action, outcome: &str) {
        self.inner()
            .transitions
            .with_label_values(&[workload.kind.as_str(), action.as_str(), outcome])
            .inc();
    }

    /// `result` is one of `executed`, `coalesced` or `failed`
    pub fn inc_wake_request(&self, result: &str) {
        self.inner().wake_requests.with_label_values(&[result]).inc();
    }

    pub fn observe_run_duration(&self, action: Action, duration_secs: f64) {
        self.inner()
            .run_duration_seconds
            .with_label_values(&[action.as_str()])
            .observe(duration_secs);
    }

    pub fn inc_run_failure(&self, action: Action, category: &str) {
        self.inner()
            .run_failures
            .with_label_values(&[action.as_str(), category])
            .inc();
    }
}

/// Structured logger for engine events
///
/// Keeps the `event` field stable so log pipelines can filter on it.
#[derive(Clone)]
pub struct SnoozeLogger {
    component: String,
}

impl SnoozeLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_transition(&self, workload: &WorkloadRef, action: Action, desired: DesiredState) {
        info!(
            event = "workload_transitioned",
            component = %self.component,
            kind = %workload.kind,
            namespace = %workload.namespace,
            name = %workload.name,
            action = %action,
            desired = %desired,
            "Applied transition"
        );
    }

    pub fn log_no_change(&self, workload: &WorkloadRef, action: Action) {
        info!(
            event = "workload_unchanged",
            component = %self.component,
            kind = %workload.kind,
            namespace = %workload.namespace,
            name = %workload.name,
            action = %action,
            "No target and no remembered state, leaving workload as is"
        );
    }

    pub fn log_ignored_namespace(&self, namespace: &str) {
        info!(
            event = "namespace_ignored",
            component = %self.component,
            namespace = %namespace,
            "Namespace is never managed, skipping"
        );
    }

    pub fn log_wake_coalesced(&self, since_last_ms: u128) {
        info!(
            event = "wake_coalesced",
            component = %self.component,
            since_last_ms = since_last_ms,
            "Wake already triggered recently, skipping"
        );
    }

    pub fn log_run_failed(&self, action: Action, namespace: &str, error: &dyn std::error::Error) {
        warn!(
            event = "run_failed",
            component = %self.component,
            action = %action,
            namespace = %namespace,
            error = %error,
            "Sleep/wake run failed"
        );
    }

    pub fn log_startup(&self, version: &str, namespace: &str, selector: &str) {
        info!(
            event = "started",
            component = %self.component,
            version = %version,
            namespace = %namespace,
            selector = %selector,
            "KubeSnooze component started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            component = %self.component,
            reason = %reason,
            "KubeSnooze component shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkloadKind;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = SnoozeMetrics::new();
        let other = metrics.clone();
        let workload = WorkloadRef::new(WorkloadKind::Deployment, "dev", "web");

        metrics.inc_transition(&workload, Action::Sleep, "applied");
        other.inc_wake_request("coalesced");
        other.observe_run_duration(Action::Wake, 0.4);
        metrics.inc_run_failure(Action::Sleep, "apply");

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "kubesnooze_transitions_total"));
    }

    #[test]
    fn test_logger_creation() {
        let logger = SnoozeLogger::new("runner");
        assert_eq!(logger.component, "runner");
    }
}
