//! KubeSnooze runner
//!
//! Runs once per CronJob invocation: applies the configured sleep or
//! wake action to the selected workloads and exits. Any failure ends
//! the process with a non-zero status so the Job is marked failed.

use anyhow::{Context, Result};
use snooze_lib::{
    config::RunnerConfig, KubeWorkloadClient, Pipeline, RunOutcome, SnoozeLogger,
    PROTECTED_NAMESPACE,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const RUNNER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = RunnerConfig::load().context("Failed to load runner configuration")?;
    let trigger = config.trigger;

    let logger = SnoozeLogger::new("runner");
    logger.log_startup(
        RUNNER_VERSION,
        trigger.namespace(),
        &trigger.selector().to_string(),
    );

    if trigger.namespace() == PROTECTED_NAMESPACE {
        logger.log_ignored_namespace(trigger.namespace());
        return Ok(());
    }

    let client = KubeWorkloadClient::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let pipeline = Pipeline::new(Arc::new(client), logger.clone());

    match pipeline
        .run(&trigger)
        .await
        .with_context(|| format!("{} run failed", trigger.action()))?
    {
        RunOutcome::Ignored => {}
        RunOutcome::Completed(report) => {
            info!(
                action = %trigger.action(),
                namespace = %trigger.namespace(),
                applied = report.applied.len(),
                unchanged = report.unchanged.len(),
                "Run finished"
            );
        }
    }

    logger.log_shutdown("run complete");
    Ok(())
}
