//! Runtime configuration for the monitor.
//!
//! This module aggregates configuration for:
//!
//! - the monitored node (RPC endpoint, poll interval, request timeout),
//! - the exporter's own listen address,
//! - service registration with Consul.
//!
//! Binaries build a [`MonitorConfig`] from defaults and overlay whatever
//! they read from files or flags.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for the service directory registration loop.
#[derive(Clone, Debug)]
pub struct RegistrationConfig {
    /// Whether to register with the directory at all.
    pub enabled: bool,
    /// Base URL of the Consul agent, e.g. `"http://127.0.0.1:8500"`.
    pub consul_address: String,
    /// Service name announced to the directory.
    pub service_name: String,
    /// Attempts before registration is abandoned.
    pub max_attempts: u32,
    /// Fixed delay between failed attempts.
    pub retry_delay: Duration,
    /// Health check interval, in Consul duration syntax.
    pub check_interval: String,
    /// Health check timeout, in Consul duration syntax.
    pub check_timeout: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            consul_address: "http://127.0.0.1:8500".to_string(),
            service_name: "pool".to_string(),
            max_attempts: 5,
            retry_delay: Duration::from_secs(60),
            check_interval: "1s".to_string(),
            check_timeout: "5s".to_string(),
        }
    }
}

/// Top-level monitor configuration.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// IP the exporter's HTTP server binds to.
    pub bind_addr: IpAddr,
    pub bind_port: u16,
    /// JSON-RPC endpoint of the monitored node.
    pub endpoint: String,
    /// Name of this node; prefixes exported metric names.
    pub node_name: String,
    /// Poll tick period.
    pub rpc_interval: Duration,
    /// Upper bound on any single HTTP request.
    pub request_timeout: Duration,
    /// Optional Etherscan API key for the reference oracle.
    pub etherscan_api_key: Option<String>,
    pub registration: RegistrationConfig,
}

impl MonitorConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.bind_port)
    }

    /// Base URL under which this process is reachable.
    pub fn advertised_url(&self) -> String {
        format!("http://{}", self.listen_addr())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let node_name = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "parity".to_string());

        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_port: 4546,
            endpoint: "http://127.0.0.1:8545".to_string(),
            node_name,
            rpc_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            etherscan_api_key: None,
            registration: RegistrationConfig::default(),
        }
    }
}
