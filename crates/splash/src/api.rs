//! HTTP API: splash page, liveness and Prometheus metrics

use crate::page;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use snooze_lib::{Pipeline, Trigger, WakeGate, WakeOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    pub pipeline: Pipeline,
    pub gate: WakeGate,
    pub trigger: Trigger,
    pub title: String,
    pub message: String,
}

impl AppState {
    pub fn new(
        pipeline: Pipeline,
        gate: WakeGate,
        trigger: Trigger,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            gate,
            trigger,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Liveness: always healthy, never touches the cluster
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Wake the environment (debounced) and render the splash page.
/// Returns 503 when the wake failed, still with the page body.
async fn splash(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state
        .gate
        .trigger(state.pipeline.run(&state.trigger))
        .await;

    match result {
        Ok(outcome) => {
            if let WakeOutcome::Executed(_) = outcome {
                info!(namespace = %state.trigger.namespace(), "Wake run finished");
            }
            (
                StatusCode::OK,
                Html(page::render(&state.title, &state.message)),
            )
        }
        Err(e) => {
            warn!(namespace = %state.trigger.namespace(), error = %e, "Wake failed");
            let message = format!("{} (wake failed: {})", state.message, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(page::render(&state.title, &message)),
            )
        }
    }
}

/// Create the API router. Every path other than health and metrics serves the splash page.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .fallback(splash)
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting splash server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
