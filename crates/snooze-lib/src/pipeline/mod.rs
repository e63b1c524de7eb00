//! Sleep/wake pipeline
//!
//! For each workload kind in turn: list the matching objects, run the
//! transition engine on each and write back the ones that changed. The
//! first failure stops the run; objects already written stay written.

#[cfg(test)]
mod tests;

use crate::cluster::WorkloadClient;
use crate::engine;
use crate::error::SnoozeError;
use crate::models::{
    Action, ActionTargets, Transition, WorkloadKind, WorkloadRef, LABEL_SNOOZE_NAME,
    PROTECTED_NAMESPACE,
};
use crate::observability::{SnoozeLogger, SnoozeMetrics};
use crate::selector::LabelSelector;
use crate::workload::Workload;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// One requested transition: what to do, where, and to what
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    action: Action,
    namespace: String,
    selector: LabelSelector,
    targets: ActionTargets,
}

impl Trigger {
    /// Validate the raw trigger input. A bad selector is rejected here,
    /// before anything is read from the cluster.
    pub fn new(
        action: Action,
        namespace: impl Into<String>,
        selector_expression: &str,
        targets: ActionTargets,
    ) -> Result<Self, SnoozeError> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(SnoozeError::configuration("namespace is required"));
        }

        let selector =
            LabelSelector::parse(selector_expression).map_err(|e| SnoozeError::InvalidSelector {
                expression: selector_expression.to_string(),
                reason: e.to_string(),
            })?;

        for (name, value) in [
            ("sleep replicas", targets.sleep.replicas),
            ("wake replicas", targets.wake.replicas),
            ("sleep autoscaler minimum", targets.sleep.autoscaler_min_replicas),
            ("wake autoscaler minimum", targets.wake.autoscaler_min_replicas),
        ] {
            if let Some(v) = value {
                if v < 0 {
                    return Err(SnoozeError::configuration(format!(
                        "{} must not be negative, got {}",
                        name, v
                    )));
                }
            }
        }

        Ok(Self {
            action,
            namespace,
            selector,
            targets,
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn selector(&self) -> &LabelSelector {
        &self.selector
    }

    pub fn targets(&self) -> &ActionTargets {
        &self.targets
    }
}

/// Objects touched by a completed run, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: Vec<WorkloadRef>,
    pub unchanged: Vec<WorkloadRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The namespace is never managed; nothing was read or written
    Ignored,
    Completed(RunReport),
}

/// Runs triggers against a cluster
#[derive(Clone)]
pub struct Pipeline {
    client: Arc<dyn WorkloadClient>,
    metrics: SnoozeMetrics,
    logger: SnoozeLogger,
}

impl Pipeline {
    pub fn new(client: Arc<dyn WorkloadClient>, logger: SnoozeLogger) -> Self {
        Self {
            client,
            metrics: SnoozeMetrics::new(),
            logger,
        }
    }

    pub async fn run(&self, trigger: &Trigger) -> Result<RunOutcome, SnoozeError> {
        if trigger.namespace == PROTECTED_NAMESPACE {
            self.logger.log_ignored_namespace(&trigger.namespace);
            return Ok(RunOutcome::Ignored);
        }

        let start = Instant::now();
        let mut report = RunReport::default();
        let mut result = Ok(());
        for kind in WorkloadKind::ALL {
            result = self.run_kind(kind, trigger, &mut report).await;
            if result.is_err() {
                break;
            }
        }

        self.metrics
            .observe_run_duration(trigger.action, start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                debug!(
                    action = %trigger.action,
                    namespace = %trigger.namespace,
                    applied = report.applied.len(),
                    unchanged = report.unchanged.len(),
                    "Run complete"
                );
                Ok(RunOutcome::Completed(report))
            }
            Err(e) => {
                self.metrics.inc_run_failure(trigger.action, e.category());
                self.logger
                    .log_run_failed(trigger.action, &trigger.namespace, &e);
                Err(e)
            }
        }
    }

    async fn run_kind(
        &self,
        kind: WorkloadKind,
        trigger: &Trigger,
        report: &mut RunReport,
    ) -> Result<(), SnoozeError> {
        let workloads = self
            .client
            .list(kind, &trigger.namespace, &trigger.selector)
            .await
            .map_err(|source| SnoozeError::Selection {
                kind,
                namespace: trigger.namespace.clone(),
                source,
            })?;

        for mut workload in workloads {
            let workload_ref = workload.workload_ref();
            if is_runner_job(&workload) {
                debug!(workload = %workload_ref, "Skipping KubeSnooze runner");
                continue;
            }

            match engine::plan(&mut workload, trigger.action, &trigger.targets) {
                Transition::NoChange => {
                    self.logger.log_no_change(&workload_ref, trigger.action);
                    self.metrics
                        .inc_transition(&workload_ref, trigger.action, "unchanged");
                    report.unchanged.push(workload_ref);
                }
                Transition::Apply(desired) => {
                    if let Err(source) = self.client.update(&workload).await {
                        self.metrics
                            .inc_transition(&workload_ref, trigger.action, "failed");
                        return Err(SnoozeError::Apply {
                            workload: workload_ref,
                            source,
                        });
                    }
                    self.logger
                        .log_transition(&workload_ref, trigger.action, desired);
                    self.metrics
                        .inc_transition(&workload_ref, trigger.action, "applied");
                    report.applied.push(workload_ref);
                }
            }
        }

        Ok(())
    }
}

/// The controller's own sleep/wake CronJobs must keep running whatever the selector says
fn is_runner_job(workload: &Workload) -> bool {
    workload
        .labels()
        .map_or(false, |labels| labels.contains_key(LABEL_SNOOZE_NAME))
}
