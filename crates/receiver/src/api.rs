//! Receiver status endpoints
//!
//! `/healthz` reflects client, target and collector health, `/readyz`
//! whether setup finished and gather cycles are running, and `/metrics`
//! the `azmon_receiver_*` self-metrics.

use crate::health::{ComponentStatus, HealthRegistry};
use crate::observability::ReceiverMetrics;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{info, warn};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// State shared by the status handlers
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ReceiverMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: ReceiverMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

/// A cycle with some failed targets still answers 200; only an unhealthy
/// component turns this into 503
async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_registry.health().await;
    let status = match health.status {
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
    };

    (status, Json(health)).into_response()
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(readiness)).into_response()
}

async fn receiver_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode receiver metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Router serving the receiver's status endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(receiver_metrics))
        .with_state(state)
}

/// Serve the status endpoints on `0.0.0.0:<port>` until the process exits
pub async fn serve(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "Serving receiver status endpoints");

    axum::serve(listener, create_router(state)).await
}
