//! Health endpoint: liveness, active viewer count and pipeline counters.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::application::pipeline::{PipelineStats, SessionRegistry, StatsSnapshot};
use crate::domain::foundation::Timestamp;

/// Service name reported by the health endpoint.
const SERVICE: &str = "log-processor";

#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<SessionRegistry>,
    pub stats: Arc<PipelineStats>,
    pub shutdown: CancellationToken,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub clients: usize,
    pub stats: StatsSnapshot,
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let shutting_down = state.shutdown.is_cancelled();
    let body = HealthResponse {
        status: if shutting_down { "shutting_down" } else { "healthy" }.to_string(),
        timestamp: Timestamp::now().to_rfc3339(),
        service: SERVICE.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        clients: state.registry.session_count().await,
        stats: state.stats.snapshot(),
    };

    let status = if shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body))
}
