//! The closed set of managed objects

use crate::models::{DesiredState, WorkloadKind, WorkloadRef};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::autoscaling::v2::{HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// A live object of one of the four managed kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    Deployment(Deployment),
    StatefulSet(StatefulSet),
    Autoscaler(HorizontalPodAutoscaler),
    PeriodicJob(CronJob),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
            Workload::Autoscaler(_) => WorkloadKind::Autoscaler,
            Workload::PeriodicJob(_) => WorkloadKind::PeriodicJob,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Workload::Deployment(o) => &o.metadata,
            Workload::StatefulSet(o) => &o.metadata,
            Workload::Autoscaler(o) => &o.metadata,
            Workload::PeriodicJob(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Workload::Deployment(o) => &mut o.metadata,
            Workload::StatefulSet(o) => &mut o.metadata,
            Workload::Autoscaler(o) => &mut o.metadata,
            Workload::PeriodicJob(o) => &mut o.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }

    pub fn workload_ref(&self) -> WorkloadRef {
        WorkloadRef::new(self.kind(), self.namespace(), self.name())
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().labels.as_ref()
    }

    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().annotations.as_ref()
    }

    /// The live value of the field the engine manages, if set
    pub fn current_state(&self) -> Option<DesiredState> {
        match self {
            Workload::Deployment(o) => o
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .map(DesiredState::Replicas),
            Workload::StatefulSet(o) => o
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .map(DesiredState::Replicas),
            Workload::Autoscaler(o) => o
                .spec
                .as_ref()
                .and_then(|s| s.min_replicas)
                .map(DesiredState::AutoscalerMinReplicas),
            Workload::PeriodicJob(o) => o
                .spec
                .as_ref()
                .and_then(|s| s.suspend)
                .map(DesiredState::Suspend),
        }
    }

    pub fn new_deployment(namespace: &str, name: &str, replicas: Option<i32>) -> Self {
        Workload::Deployment(Deployment {
            metadata: object_meta(namespace, name),
            spec: Some(DeploymentSpec {
                replicas,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    pub fn new_stateful_set(namespace: &str, name: &str, replicas: Option<i32>) -> Self {
        Workload::StatefulSet(StatefulSet {
            metadata: object_meta(namespace, name),
            spec: Some(StatefulSetSpec {
                replicas,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    pub fn new_autoscaler(
        namespace: &str,
        name: &str,
        min_replicas: Option<i32>,
        max_replicas: i32,
    ) -> Self {
        Workload::Autoscaler(HorizontalPodAutoscaler {
            metadata: object_meta(namespace, name),
            spec: Some(HorizontalPodAutoscalerSpec {
                min_replicas,
                max_replicas,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    pub fn new_periodic_job(
        namespace: &str,
        name: &str,
        schedule: &str,
        suspend: Option<bool>,
    ) -> Self {
        Workload::PeriodicJob(CronJob {
            metadata: object_meta(namespace, name),
            spec: Some(CronJobSpec {
                schedule: schedule.to_string(),
                suspend,
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    pub fn with_labels<'a>(mut self, labels: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = self.metadata_mut().labels.get_or_insert_with(BTreeMap::new);
        for (key, value) in labels {
            map.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.metadata_mut()
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }
}

fn object_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}
