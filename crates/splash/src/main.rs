//! KubeSnooze splash server
//!
//! Serves the splash page for one namespace and wakes its workloads
//! when the page is requested.

use anyhow::{Context, Result};
use kubesnooze_splash::{api, config::SplashConfig};
use snooze_lib::{KubeWorkloadClient, Pipeline, SnoozeLogger, WakeGate, PROTECTED_NAMESPACE};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SPLASH_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = SplashConfig::load().context("Failed to load splash configuration")?;
    let trigger = config.trigger.clone();

    let logger = SnoozeLogger::new("splash");
    logger.log_startup(
        SPLASH_VERSION,
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

    let app_state = Arc::new(api::AppState::new(
        pipeline,
        WakeGate::default(),
        trigger,
        config.title,
        config.message,
    ));

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        result = api_handle => {
            result.context("Splash server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
