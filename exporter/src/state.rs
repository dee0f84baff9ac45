//! Shared state for the HTTP handlers.

use std::sync::Arc;

use tokio::sync::watch;

use monitor::{EngineStatus, InMemorySink, PrometheusSink};

/// Read-only views onto the engine, handed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// Status published by the poll engine after every tick.
    pub status: watch::Receiver<EngineStatus>,
    /// Latest gauge values, rendered as JSON.
    pub memory: Arc<InMemorySink>,
    /// Prometheus registry, rendered in text format.
    pub prometheus: Arc<PrometheusSink>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
