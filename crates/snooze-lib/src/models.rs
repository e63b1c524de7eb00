//! Core data models for sleep/wake transitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace the engine never touches
pub const PROTECTED_NAMESPACE: &str = "kube-system";

/// Set on the runner CronJobs the controller creates; names the owning KubeSnooze
pub const LABEL_SNOOZE_NAME: &str = "kubesnooze.io/name";

/// Direction of a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Sleep,
    Wake,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Sleep => "sleep",
            Action::Wake => "wake",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sleep" => Ok(Action::Sleep),
            "wake" => Ok(Action::Wake),
            other => Err(format!("invalid action: {:?}", other)),
        }
    }
}

/// The closed set of workload kinds the engine manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    Autoscaler,
    PeriodicJob,
}

impl WorkloadKind {
    /// Processing order for a pipeline run
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::Autoscaler,
        WorkloadKind::PeriodicJob,
    ];

    /// Kubernetes kind name of the backing object
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::Autoscaler => "HorizontalPodAutoscaler",
            WorkloadKind::PeriodicJob => "CronJob",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one managed object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(kind: WorkloadKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Explicit targets for one action. `None` means "no explicit target".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepWakeTargets {
    pub replicas: Option<i32>,
    pub autoscaler_min_replicas: Option<i32>,
    pub suspend_periodic_jobs: Option<bool>,
}

/// Targets for both actions, fixed for the duration of an invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTargets {
    pub sleep: SleepWakeTargets,
    pub wake: SleepWakeTargets,
}

impl ActionTargets {
    pub fn for_action(&self, action: Action) -> &SleepWakeTargets {
        match action {
            Action::Sleep => &self.sleep,
            Action::Wake => &self.wake,
        }
    }
}

/// The single spec field the apply step writes, per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredState {
    Replicas(i32),
    AutoscalerMinReplicas(i32),
    Suspend(bool),
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Replicas(n) => write!(f, "replicas={}", n),
            DesiredState::AutoscalerMinReplicas(n) => write!(f, "minReplicas={}", n),
            DesiredState::Suspend(s) => write!(f, "suspend={}", s),
        }
    }
}

/// Outcome of the transition engine for one workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write this desired state back to the cluster
    Apply(DesiredState),
    /// Nothing to do; not an error
    NoChange,
}
