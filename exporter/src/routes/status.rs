use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use monitor::SyncState;

use crate::state::SharedState;

/// Body shared by `/health` and `/synced`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub state: SyncState,
    pub chain: Option<String>,
    pub synced: bool,
}

impl StatusResponse {
    fn current(state: &SharedState) -> Self {
        let engine = state.status.borrow().clone();
        Self {
            status: "ok",
            synced: engine.state.is_synced(),
            state: engine.state,
            chain: engine.chain,
        }
    }
}

/// `GET /health`
///
/// Liveness of the exporter itself; always 200.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<StatusResponse>) {
    (StatusCode::OK, Json(StatusResponse::current(&state)))
}

/// `GET /synced`
///
/// 200 when the node is level with the reference height, 503 otherwise.
/// Target of the registered health check.
pub async fn synced(State(state): State<SharedState>) -> (StatusCode, Json<StatusResponse>) {
    let body = StatusResponse::current(&state);
    if body.synced {
        (StatusCode::OK, Json(body))
    } else {
        let body = StatusResponse {
            status: "unsynced",
            ..body
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}
