//! HTTP adapters - the two independently owned listeners.
//!
//! - `viewer_router` - push-channel upgrade endpoint for live viewers
//! - `health_router` - liveness and pipeline counters

mod health;
mod viewer;

pub use health::{health_router, HealthResponse, HealthState};
pub use viewer::{viewer_router, ViewerState, MAX_INBOUND_MESSAGE_BYTES};

/// Resolves once `cancel` fires; used for graceful server shutdown.
pub(crate) async fn shutdown_signal(cancel: tokio_util::sync::CancellationToken) {
    cancel.cancelled().await;
}
