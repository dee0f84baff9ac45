//! HTTP routes served by the exporter.

pub mod metrics;
pub mod status;

use axum::{Router, routing::get};

use crate::state::SharedState;

/// Builds the router for `/metrics`, `/synced` and `/health`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(metrics::metrics))
        .route("/synced", get(status::synced))
        .route("/health", get(status::health))
        .with_state(state)
}
