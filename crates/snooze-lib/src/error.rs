//! Error taxonomy for the sleep/wake engine

use crate::models::{WorkloadKind, WorkloadRef};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single list or update call against the cluster
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The object changed since it was read (optimistic concurrency)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Kube(kube::Error),

    /// Failure reported by a non-Kubernetes backend
    #[error("{0}")]
    Backend(String),
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => ClusterError::Conflict(ae.message),
            kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(ae.message),
            other => ClusterError::Kube(other),
        }
    }
}

/// Errors surfaced by a sleep/wake invocation
#[derive(Debug, Error)]
pub enum SnoozeError {
    /// Missing or invalid input; fatal to the invoking process
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid label selector {expression:?}: {reason}")]
    InvalidSelector { expression: String, reason: String },

    #[error("failed to list {kind} in namespace {namespace}: {source}")]
    Selection {
        kind: WorkloadKind,
        namespace: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to update {workload}: {source}")]
    Apply {
        workload: WorkloadRef,
        #[source]
        source: ClusterError,
    },

    #[error("wake did not finish within {0:?}")]
    Timeout(Duration),
}

impl SnoozeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SnoozeError::Configuration(message.into())
    }

    /// Short label used for metrics and log fields
    pub fn category(&self) -> &'static str {
        match self {
            SnoozeError::Configuration(_) => "configuration",
            SnoozeError::InvalidSelector { .. } | SnoozeError::Selection { .. } => "selection",
            SnoozeError::Apply { .. } => "apply",
            SnoozeError::Timeout(_) => "timeout",
        }
    }
}
