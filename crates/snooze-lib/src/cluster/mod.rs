//! Cluster listing/update boundary
//!
//! The pipeline talks to the cluster only through [`WorkloadClient`]. The
//! Kubernetes implementation lives in [`KubeWorkloadClient`]; an in-memory
//! implementation backs the tests.

mod kube_client;
mod memory;

pub use kube_client::KubeWorkloadClient;
pub use memory::InMemoryCluster;

use async_trait::async_trait;
use crate::error::ClusterError;
use crate::models::WorkloadKind;
use crate::selector::LabelSelector;
use crate::workload::Workload;

#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// List the live objects of `kind` in `namespace` matching `selector`
    async fn list(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, ClusterError>;

    /// Replace the object, guarded by the resourceVersion it was read at
    async fn update(&self, workload: &Workload) -> Result<Workload, ClusterError>;
}
