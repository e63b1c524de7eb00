//! Kubernetes API backed workload client

use super::WorkloadClient;
use async_trait::async_trait;
use crate::error::ClusterError;
use crate::models::WorkloadKind;
use crate::selector::LabelSelector;
use crate::workload::Workload;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
}

impl KubeWorkloadClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from in-cluster config or the local kubeconfig
    pub async fn try_default() -> Result<Self, ClusterError> {
        Ok(Self::new(Client::try_default().await?))
    }

    async fn list_as<K>(
        &self,
        namespace: &str,
        params: &ListParams,
        wrap: fn(K) -> Workload,
    ) -> Result<Vec<Workload>, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(params).await?;
        Ok(list.items.into_iter().map(wrap).collect())
    }

    async fn replace_as<K>(
        &self,
        object: &K,
        wrap: fn(K) -> Workload,
    ) -> Result<Workload, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let meta = object.meta();
        let namespace = meta.namespace.as_deref().unwrap_or_default();
        let name = meta
            .name
            .as_deref()
            .ok_or_else(|| ClusterError::Backend("object has no name".to_string()))?;

        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let updated = api.replace(name, &PostParams::default(), object).await?;
        Ok(wrap(updated))
    }
}

#[async_trait]
impl WorkloadClient for KubeWorkloadClient {
    async fn list(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, ClusterError> {
        let expression = selector.to_string();
        debug!(kind = %kind, namespace = %namespace, selector = %expression, "Listing workloads");

        let params = ListParams::default().labels(&expression);
        match kind {
            WorkloadKind::Deployment => {
                self.list_as::<Deployment>(namespace, &params, Workload::Deployment)
                    .await
            }
            WorkloadKind::StatefulSet => {
                self.list_as::<StatefulSet>(namespace, &params, Workload::StatefulSet)
                    .await
            }
            WorkloadKind::Autoscaler => {
                self.list_as::<HorizontalPodAutoscaler>(namespace, &params, Workload::Autoscaler)
                    .await
            }
            WorkloadKind::PeriodicJob => {
                self.list_as::<CronJob>(namespace, &params, Workload::PeriodicJob)
                    .await
            }
        }
    }

    async fn update(&self, workload: &Workload) -> Result<Workload, ClusterError> {
        match workload {
            Workload::Deployment(o) => self.replace_as(o, Workload::Deployment).await,
            Workload::StatefulSet(o) => self.replace_as(o, Workload::StatefulSet).await,
            Workload::Autoscaler(o) => self.replace_as(o, Workload::Autoscaler).await,
            Workload::PeriodicJob(o) => self.replace_as(o, Workload::PeriodicJob).await,
        }
    }
}
