//! Reference oracle for the canonical chain height.
//!
//! The node's own height says nothing about whether it is keeping up, so the
//! engine compares it against a third-party explorer. Which explorer to ask
//! depends on the chain the node reports, and is looked up once per session
//! from a [`ReferenceTable`].

use std::collections::BTreeMap;
use std::sync::Arc;

use num_bigint::BigUint;
use reqwest::Client;
use serde_json::Value;

use crate::error::{DecodeError, MonitorError};
use crate::rpc::decode_quantity;
use crate::rpc::transport::{HttpTransport, Transport};
use crate::rpc::types::RpcResponse;

/// Etherscan proxy endpoint for Kovan.
pub const KOVAN_ETHERSCAN_URL: &str =
    "https://kovan.etherscan.io/api?module=proxy&action=eth_blockNumber";

/// Etherscan proxy endpoint for mainnet (`foundation` in Parity's naming).
pub const FOUNDATION_ETHERSCAN_URL: &str =
    "https://api.etherscan.io/api?module=proxy&action=eth_blockNumber";

/// Client for one reference endpoint.
#[derive(Clone, Debug)]
pub struct ReferenceClient {
    url: String,
    transport: Arc<dyn Transport>,
}

impl ReferenceClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(client)), url)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the externally observed chain height.
    ///
    /// The body is a JSON-RPC style envelope whose `result` is a hex string.
    pub async fn current_height(&self) -> Result<BigUint, MonitorError> {
        let body = self.transport.get(&self.url).await?;

        let envelope: RpcResponse = serde_json::from_str(&body).map_err(|e| {
            DecodeError::new("reference envelope", body.clone(), e.to_string())
        })?;

        match envelope.into_result()? {
            Value::String(literal) => Ok(decode_quantity("reference height", &literal)?),
            other => Err(DecodeError::new(
                "reference height",
                other.to_string(),
                "expected a hex string",
            )
            .into()),
        }
    }
}

/// Fixed mapping from chain name to reference endpoint.
#[derive(Clone, Debug)]
pub struct ReferenceTable {
    transport: Arc<dyn Transport>,
    entries: BTreeMap<String, String>,
}

impl ReferenceTable {
    /// Builds a table from explicit `(chain, url)` pairs.
    pub fn new<I, K, V>(client: Client, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_transport(Arc::new(HttpTransport::new(client)), entries)
    }

    pub fn with_transport<I, K, V>(transport: Arc<dyn Transport>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            transport,
            entries: entries
                .into_iter()
                .map(|(chain, url)| (chain.into(), url.into()))
                .collect(),
        }
    }

    /// The Etherscan table: `kovan` and `foundation`.
    ///
    /// When `api_key` is set it is appended to every URL.
    pub fn etherscan(client: Client, api_key: Option<&str>) -> Self {
        let with_key = |url: &str| match api_key {
            Some(key) => format!("{url}&apikey={key}"),
            None => url.to_string(),
        };

        Self::new(
            client,
            [
                ("kovan", with_key(KOVAN_ETHERSCAN_URL)),
                ("foundation", with_key(FOUNDATION_ETHERSCAN_URL)),
            ],
        )
    }

    /// Looks up the reference URL for `chain`.
    pub fn url_for(&self, chain: &str) -> Result<&str, MonitorError> {
        self.entries
            .get(chain)
            .map(String::as_str)
            .ok_or_else(|| MonitorError::UnsupportedChain {
                chain: chain.to_string(),
                supported: self.supported().join(", "),
            })
    }

    /// Builds the reference client for `chain`.
    pub fn client_for(&self, chain: &str) -> Result<ReferenceClient, MonitorError> {
        let url = self.url_for(chain)?;
        Ok(ReferenceClient::with_transport(self.transport.clone(), url))
    }

    pub fn supported(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
