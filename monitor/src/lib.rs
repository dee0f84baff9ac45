//! Monitor library crate.
//!
//! This crate provides the polling and state-tracking core of the node
//! exporter:
//!
//! - a JSON-RPC client with hex quantity decoding (`rpc`),
//! - a reference-height oracle keyed by chain name (`reference`),
//! - gauge sinks, including a Prometheus registry (`metrics`),
//! - the connect/poll state machine and metric derivation (`engine`),
//! - bounded-retry service registration with Consul (`registration`),
//! - the error taxonomy (`error`) and runtime configuration (`config`).
//!
//! Binaries compose these pieces with an HTTP surface and a config source.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod reference;
pub mod registration;
pub mod rpc;

// Re-export configuration types.
pub use config::{MonitorConfig, RegistrationConfig};

// Re-export the engine and its published status.
pub use engine::{EngineStatus, NodeIdentity, PollEngine, SyncState};

pub use error::{DecodeError, MonitorError, TransportError};

// Re-export sinks.
pub use metrics::{FanoutSink, InMemorySink, MetricsSink, PrometheusSink};

pub use reference::{ReferenceClient, ReferenceTable};

pub use registration::{
    ConsulDirectory, RegistrationLoop, RegistrationOutcome, ServiceDirectory, ServiceRegistration,
};

pub use rpc::{BlockSnapshot, HttpTransport, RpcClient, SyncProgress, Transport};
