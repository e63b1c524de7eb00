//! In-memory workload client
//!
//! Mirrors the API server behaviour the engine relies on: label filtering,
//! resourceVersion checks on update and per-call counters. Failures and
//! latency can be injected for tests.

use super::WorkloadClient;
use async_trait::async_trait;
use crate::error::ClusterError;
use crate::models::{WorkloadKind, WorkloadRef};
use crate::selector::LabelSelector;
use crate::workload::Workload;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    objects: BTreeMap<WorkloadRef, Workload>,
    next_version: u64,
    list_calls: usize,
    update_calls: usize,
    failing_updates: HashSet<WorkloadRef>,
    failing_lists: HashSet<WorkloadKind>,
}

#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every list and update call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store an object, assigning it a fresh resourceVersion
    pub async fn insert(&self, mut workload: Workload) {
        let mut state = self.state.lock().await;
        state.next_version += 1;
        workload.metadata_mut().resource_version = Some(state.next_version.to_string());
        state.objects.insert(workload.workload_ref(), workload);
    }

    pub async fn get(&self, workload: &WorkloadRef) -> Option<Workload> {
        self.state.lock().await.objects.get(workload).cloned()
    }

    /// Make every update of `workload` fail
    pub async fn fail_updates_for(&self, workload: WorkloadRef) {
        self.state.lock().await.failing_updates.insert(workload);
    }

    /// Make every list of `kind` fail
    pub async fn fail_lists_for(&self, kind: WorkloadKind) {
        self.state.lock().await.failing_lists.insert(kind);
    }

    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_calls
    }

    pub async fn update_calls(&self) -> usize {
        self.state.lock().await.update_calls
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl WorkloadClient for InMemoryCluster {
    async fn list(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, ClusterError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.list_calls += 1;

        if state.failing_lists.contains(&kind) {
            return Err(ClusterError::Backend(format!("listing {} is unavailable", kind)));
        }

        let empty = BTreeMap::new();
        Ok(state
            .objects
            .iter()
            .filter(|(r, _)| r.kind == kind && r.namespace == namespace)
            .filter(|(_, w)| selector.matches(w.labels().unwrap_or(&empty)))
            .map(|(_, w)| w.clone())
            .collect())
    }

    async fn update(&self, workload: &Workload) -> Result<Workload, ClusterError> {
        self.delay().await;
        let mut state = self.state.lock().await;
        state.update_calls += 1;

        let key = workload.workload_ref();
        if state.failing_updates.contains(&key) {
            return Err(ClusterError::Backend(format!("update of {} rejected", key)));
        }

        let stored_version = state
            .objects
            .get(&key)
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))?
            .metadata()
            .resource_version
            .clone();
        if stored_version != workload.metadata().resource_version {
            return Err(ClusterError::Conflict(format!(
                "{} was modified since it was read",
                key
            )));
        }

        state.next_version += 1;
        let mut updated = workload.clone();
        updated.metadata_mut().resource_version = Some(state.next_version.to_string());
        state.objects.insert(key, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_by_kind_namespace_and_labels() {
        let cluster = InMemoryCluster::new();
        cluster
            .insert(Workload::new_deployment("dev", "web", Some(2)).with_labels([("app", "web")]))
            .await;
        cluster
            .insert(Workload::new_deployment("dev", "api", Some(2)).with_labels([("app", "api")]))
            .await;
        cluster
            .insert(Workload::new_deployment("prod", "web", Some(2)).with_labels([("app", "web")]))
            .await;
        cluster
            .insert(Workload::new_stateful_set("dev", "web", Some(1)).with_labels([("app", "web")]))
            .await;

        let selector = LabelSelector::parse("app=web").unwrap();
        let found = cluster
            .list(WorkloadKind::Deployment, "dev", &selector)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "web");
        assert_eq!(cluster.list_calls().await, 1);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let cluster = InMemoryCluster::new();
        cluster.insert(Workload::new_deployment("dev", "web", Some(2))).await;

        let selector = LabelSelector::default();
        let read = cluster
            .list(WorkloadKind::Deployment, "dev", &selector)
            .await
            .unwrap()
            .remove(0);

        cluster.update(&read).await.unwrap();
        let err = cluster.update(&read).await.unwrap_err();
        assert!(matches!(err, ClusterError::Conflict(_)));
    }
}
