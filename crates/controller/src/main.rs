//! KubeSnooze controller
//!
//! Watches KubeSnooze resources and keeps their runner CronJobs and
//! RBAC in place.

use anyhow::{Context as _, Result};
use futures::StreamExt;
use k8s_openapi::api::batch::v1::CronJob;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use snooze_lib::crd::KubeSnooze;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod reconciler;
mod resources;

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config =
        config::ControllerConfig::load().context("Failed to load controller configuration")?;
    info!(
        version = CONTROLLER_VERSION,
        runner_image = %config.runner_image,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        "Starting kubesnooze-controller"
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (snoozes, cron_jobs): (Api<KubeSnooze>, Api<CronJob>) = match &config.watch_namespace {
        Some(namespace) => (
            Api::namespaced(client.clone(), namespace),
            Api::namespaced(client.clone(), namespace),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    let ctx = Arc::new(reconciler::Context::new(client, config));

    Controller::new(snoozes, watcher::Config::default())
        .owns(cron_jobs, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconciler::reconcile, reconciler::error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(object = %object, "Reconciled"),
                Err(e) => warn!(error = %e, "Reconcile loop error"),
            }
        })
        .await;

    info!("Shutting down");
    Ok(())
}
