//! Exporter configuration sources.
//!
//! Settings are layered, later layers winning:
//!
//! 1. [`MonitorConfig::default()`],
//! 2. an optional JSON file given with `--config`,
//! 3. command-line flags.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;

use monitor::MonitorConfig;

/// Command-line flags.
#[derive(Parser, Debug, Default)]
#[command(name = "exporter")]
#[command(about = "Exports Ethereum node health metrics and registers the exporter with Consul")]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the node
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Node name used as the metrics prefix
    #[arg(long)]
    pub nodename: Option<String>,

    /// IP address to bind the HTTP server to
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(long)]
    pub port: Option<u16>,

    /// Poll interval in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Consul agent address
    #[arg(long)]
    pub consul: Option<String>,

    /// Service name announced to Consul
    #[arg(long)]
    pub service_name: Option<String>,

    /// Skip Consul registration
    #[arg(long)]
    pub no_register: bool,
}

/// One configuration layer. Unset fields leave the layer below untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub endpoint: Option<String>,
    pub nodename: Option<String>,
    pub rpc_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub consul_address: Option<String>,
    pub consul_service_name: Option<String>,
    pub register: Option<bool>,
    pub etherscan_api_key: Option<String>,
}

impl ConfigLayer {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Overlays this layer onto `config`.
    pub fn apply(self, config: &mut MonitorConfig) -> anyhow::Result<()> {
        if let Some(bind) = self.bind {
            config.bind_addr = bind
                .parse::<IpAddr>()
                .with_context(|| format!("bind address '{bind}' is not a valid ip"))?;
        }
        if let Some(port) = self.port {
            config.bind_port = port;
        }
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(nodename) = self.nodename {
            config.node_name = nodename;
        }
        if let Some(secs) = self.rpc_interval_secs {
            if secs == 0 {
                bail!("rpc interval must be at least one second");
            }
            config.rpc_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            if secs == 0 {
                bail!("request timeout must be at least one second");
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(address) = self.consul_address {
            config.registration.consul_address = address;
        }
        if let Some(name) = self.consul_service_name {
            config.registration.service_name = name;
        }
        if let Some(register) = self.register {
            config.registration.enabled = register;
        }
        if let Some(key) = self.etherscan_api_key {
            config.etherscan_api_key = Some(key);
        }
        Ok(())
    }
}

impl From<Cli> for ConfigLayer {
    fn from(cli: Cli) -> Self {
        Self {
            bind: cli.bind,
            port: cli.port,
            endpoint: cli.endpoint,
            nodename: cli.nodename,
            rpc_interval_secs: cli.interval,
            request_timeout_secs: None,
            consul_address: cli.consul,
            consul_service_name: cli.service_name,
            register: cli.no_register.then_some(false),
            etherscan_api_key: None,
        }
    }
}

/// Resolves the final configuration from defaults, file and flags.
pub fn load(mut cli: Cli) -> anyhow::Result<MonitorConfig> {
    let mut config = MonitorConfig::default();

    if let Some(path) = cli.config.take() {
        ConfigLayer::from_file(&path)?.apply(&mut config)?;
    }
    ConfigLayer::from(cli).apply(&mut config)?;

    Ok(config)
}
