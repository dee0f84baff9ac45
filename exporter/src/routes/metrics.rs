use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::state::SharedState;

/// Query string for `GET /metrics`.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    pub format: Option<String>,
}

/// `GET /metrics`
///
/// JSON snapshot of the latest gauges by default; Prometheus text format
/// with `?format=prometheus`.
pub async fn metrics(
    State(state): State<SharedState>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    match query.format.as_deref() {
        Some("prometheus") => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            state.prometheus.gather_text(),
        )
            .into_response(),
        _ => (StatusCode::OK, Json(state.memory.snapshot())).into_response(),
    }
}
