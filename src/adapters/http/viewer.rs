//! Viewer endpoint: upgrades HTTP requests to push-channel sessions.
//!
//! # Connection Flow
//! 1. Viewer requests a WebSocket upgrade on the configured path
//! 2. Refused with 503 once the pipeline is shutting down
//! 3. On upgrade the socket is split and handed to a [`ViewerSession`]
//! 4. The session runs until the viewer leaves, is evicted, or shutdown

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http::StatusCode;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::adapters::push::split_socket;
use crate::application::pipeline::{PipelineStats, SessionRegistry, SessionSettings, ViewerSession};

/// Largest inbound frame accepted from a viewer.
pub const MAX_INBOUND_MESSAGE_BYTES: usize = 512;

/// State shared by upgrade handlers.
#[derive(Clone)]
pub struct ViewerState {
    pub registry: Arc<SessionRegistry>,
    pub stats: Arc<PipelineStats>,
    pub settings: SessionSettings,
    pub shutdown: CancellationToken,
    /// Tracks running sessions so shutdown can wait for them.
    pub sessions: TaskTracker,
}

/// Router serving the upgrade endpoint at `path`.
pub fn viewer_router(path: &str, state: ViewerState) -> Router {
    Router::new()
        .route(path, get(upgrade_viewer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle a viewer's upgrade request.
async fn upgrade_viewer(
    State(state): State<ViewerState>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    if state.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response();
    }

    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "websocket upgrade required").into_response();
    };

    ws.max_message_size(MAX_INBOUND_MESSAGE_BYTES)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = split_socket(socket);
            let session = ViewerSession::new(state.registry, state.stats, state.settings);
            tracing::info!(viewer_id = %session.id(), "Viewer connected");
            state.sessions.track_future(session.run(sink, stream)).await;
        })
}
