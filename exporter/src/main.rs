//! Node exporter binary.
//!
//! Polls an Ethereum node over JSON-RPC, compares its height against the
//! Etherscan reference for its chain and serves the result over HTTP:
//!
//! - `GET /metrics` (JSON, or Prometheus text with `?format=prometheus`)
//! - `GET /synced`
//! - `GET /health`
//!
//! Once the chain is known the exporter registers itself with a local
//! Consul agent, using `/synced` as the health check.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use monitor::{
    ConsulDirectory, FanoutSink, InMemorySink, MetricsSink, PollEngine, PrometheusSink,
    RegistrationLoop, RegistrationOutcome,
};
use config::Cli;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("exporter=info,monitor=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = config::load(Cli::parse())?;

    // ---------------------------
    // Sinks
    // ---------------------------

    let memory = Arc::new(InMemorySink::new());
    let prometheus = Arc::new(
        PrometheusSink::new(&config.node_name).context("failed to initialise metrics registry")?,
    );
    let sinks: Vec<Arc<dyn MetricsSink>> = vec![memory.clone(), prometheus.clone()];
    let sink: Arc<dyn MetricsSink> = Arc::new(FanoutSink::new(sinks));

    // ---------------------------
    // Poll engine
    // ---------------------------

    let mut engine =
        PollEngine::from_config(&config, sink).context("failed to build poll engine")?;
    let status = engine.subscribe();
    let cancel = CancellationToken::new();

    tracing::info!(
        endpoint = %config.endpoint,
        interval_secs = config.rpc_interval.as_secs(),
        "polling node"
    );
    let engine_cancel = cancel.clone();
    let engine_task = tokio::spawn(async move { engine.run(engine_cancel).await });

    // ---------------------------
    // Service registration
    // ---------------------------

    let directory = ConsulDirectory::from_config(&config.registration, config.request_timeout)
        .context("failed to build consul client")?;
    let registration = RegistrationLoop::new(
        directory,
        config.registration.clone(),
        config.listen_addr(),
        status.clone(),
    );
    let registration_cancel = cancel.clone();
    let registration_task = tokio::spawn(async move {
        match registration.run(registration_cancel).await {
            RegistrationOutcome::Abandoned { attempts } => {
                tracing::warn!(attempts, "service not registered");
            }
            outcome => tracing::debug!(?outcome, "registration finished"),
        }
    });

    // ---------------------------
    // Shutdown
    // ---------------------------

    tokio::spawn(shutdown_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    // ---------------------------
    // HTTP server
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        status,
        memory,
        prometheus,
    });
    let app = routes::router(app_state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("exporter listening on {}", config.advertised_url());

    let server_cancel = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await
        .context("HTTP server error");

    // The server can also stop on its own error; take the workers down with it.
    cancel.cancel();
    let _ = tokio::join!(engine_task, registration_task);

    served
}

/// Cancels `cancel` once `signal` fires.
///
/// If the handler could not be installed the exporter keeps running and can
/// only be stopped from outside.
async fn shutdown_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("shutdown signal received");
            cancel.cancel();
        }
        Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
    }
}
