//! Core library for KubeSnooze
//!
//! This crate provides the core functionality for:
//! - Selecting workloads by label selector
//! - Remembering pre-sleep state on the workloads themselves
//! - Deciding and applying sleep/wake transitions
//! - Debouncing on-demand wake requests
//! - The KubeSnooze custom resource, configuration and observability

pub mod cluster;
pub mod config;
pub mod crd;
pub mod engine;
pub mod error;
pub mod gate;
pub mod memory;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod selector;
pub mod workload;

pub use cluster::{InMemoryCluster, KubeWorkloadClient, WorkloadClient};
pub use error::{ClusterError, SnoozeError};
pub use gate::{WakeGate, WakeOutcome};
pub use models::*;
pub use observability::{SnoozeLogger, SnoozeMetrics};
pub use pipeline::{Pipeline, RunOutcome, RunReport, Trigger};
pub use selector::LabelSelector;
pub use workload::Workload;
