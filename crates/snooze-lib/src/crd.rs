//! KubeSnooze custom resource
//!
//! Declares a sleep/wake schedule for the labelled workloads of one
//! namespace. The controller turns it into runner CronJobs.

use crate::models::{ActionTargets, SleepWakeTargets};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "kubesnooze.io";

/// How workloads are adjusted during sleep or wake
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnoozeBehavior {
    /// Desired replica count for Deployments and StatefulSets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Desired minReplicas for HorizontalPodAutoscalers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpa_min_replicas: Option<i32>,
    /// CronJob suspension state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend_cron_jobs: Option<bool>,
}

impl SnoozeBehavior {
    pub fn targets(&self) -> SleepWakeTargets {
        SleepWakeTargets {
            replicas: self.replicas,
            autoscaler_min_replicas: self.hpa_min_replicas,
            suspend_periodic_jobs: self.suspend_cron_jobs,
        }
    }
}

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "kubesnooze.io",
    version = "v1alpha1",
    kind = "KubeSnooze",
    namespaced,
    status = "KubeSnoozeStatus",
    shortname = "snooze"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeSnoozeSpec {
    /// Workloads in the namespace to manage
    pub selector: LabelSelector,
    /// When to apply sleep behavior
    pub sleep_cron: String,
    /// When to apply wake behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake_cron: Option<String>,
    /// Time zone the CronJobs run in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Image used by the runner pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_image: Option<String>,
    #[serde(default)]
    pub sleep: SnoozeBehavior,
    #[serde(default)]
    pub wake: SnoozeBehavior,
}

impl KubeSnoozeSpec {
    pub fn targets(&self) -> ActionTargets {
        ActionTargets {
            sleep: self.sleep.targets(),
            wake: self.wake.targets(),
        }
    }

    /// The wake schedule, if one is set and non-empty
    pub fn wake_schedule(&self) -> Option<&str> {
        self.wake_cron.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeSnoozeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sleep_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_wake_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_crd_identity() {
        let crd = KubeSnooze::crd();
        assert_eq!(crd.metadata.name.as_deref(), Some("kubesnoozes.kubesnooze.io"));
        assert_eq!(crd.spec.group, GROUP);
        assert_eq!(crd.spec.scope, "Namespaced");
    }

    #[test]
    fn test_spec_deserializes_from_manifest() {
        let spec: KubeSnoozeSpec = serde_json::from_value(serde_json::json!({
            "selector": { "matchLabels": { "env": "dev" } },
            "sleepCron": "0 20 * * 1-5",
            "wakeCron": "0 7 * * 1-5",
            "timezone": "Europe/Berlin",
            "sleep": { "hpaMinReplicas": 1 },
            "wake": { "replicas": 2, "suspendCronJobs": false }
        }))
        .unwrap();

        assert_eq!(spec.wake_schedule(), Some("0 7 * * 1-5"));
        let targets = spec.targets();
        assert_eq!(targets.sleep.autoscaler_min_replicas, Some(1));
        assert_eq!(targets.sleep.replicas, None);
        assert_eq!(targets.wake.replicas, Some(2));
        assert_eq!(targets.wake.suspend_periodic_jobs, Some(false));
    }

    #[test]
    fn test_empty_wake_cron_is_unset() {
        let spec: KubeSnoozeSpec = serde_json::from_value(serde_json::json!({
            "selector": {},
            "sleepCron": "0 20 * * *",
            "wakeCron": ""
        }))
        .unwrap();
        assert_eq!(spec.wake_schedule(), None);
        assert_eq!(spec.sleep, SnoozeBehavior::default());
    }
}
