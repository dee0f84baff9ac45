//! HTTP JSON-RPC client for a single Ethereum node.
//!
//! Every call is a `POST` of a JSON-RPC 2.0 envelope:
//!
//! ```json
//! {"id": 1, "method": "eth_blockNumber", "jsonrpc": "2.0", "params": []}
//! ```
//!
//! and the response's `result` is decoded by the typed accessors below.

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use reqwest::Client;
use serde_json::{Map, Value, json};

use super::hex::{decode_quantity, encode_quantity, quantity_to_u64};
use super::transport::{HttpTransport, Transport};
use super::types::{BlockSnapshot, PartialBlock, RpcResponse, SyncProgress};
use crate::error::{DecodeError, MonitorError};

/// JSON-RPC client bound to one node endpoint.
///
/// Cheap to clone; the transport is shared.
#[derive(Clone, Debug)]
pub struct RpcClient {
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl RpcClient {
    /// Creates a client for `endpoint` with its own HTTP client.
    ///
    /// `timeout` bounds each request so a hung node cannot stall the poll
    /// loop; a timeout surfaces as [`crate::TransportError::Timeout`].
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MonitorError> {
        let transport = HttpTransport::with_timeout(timeout)?;
        Ok(Self::with_transport(Arc::new(transport), endpoint))
    }

    /// Creates a client for `endpoint` sharing an existing HTTP client.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(client)), endpoint)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issues `method` with `params` and returns the raw `result` value.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, MonitorError> {
        let request = json!({
            "id": 1,
            "method": method,
            "jsonrpc": "2.0",
            "params": params,
        });

        let body = self.transport.post_json(&self.endpoint, &request).await?;

        let envelope: RpcResponse = serde_json::from_str(&body).map_err(|e| {
            DecodeError::new(format!("{method} envelope"), body.clone(), e.to_string())
        })?;

        envelope.into_result()
    }

    /// Calls `method` without parameters and expects a string result.
    async fn call_string(&self, method: &str) -> Result<String, MonitorError> {
        match self.call(method, json!([])).await? {
            Value::String(s) => Ok(s),
            other => {
                Err(DecodeError::new(method, other.to_string(), "expected a string result").into())
            }
        }
    }

    /// Calls `method` without parameters and hex-decodes the string result.
    async fn call_quantity(&self, method: &str) -> Result<BigUint, MonitorError> {
        let literal = self.call_string(method).await?;
        Ok(decode_quantity(method, &literal)?)
    }

    /// `net_peerCount`.
    pub async fn peer_count(&self) -> Result<u64, MonitorError> {
        let peers = self.call_quantity("net_peerCount").await?;
        Ok(quantity_to_u64("net_peerCount", &peers)?)
    }

    /// `parity_chain`: the node's chain label, e.g. `"kovan"` or `"foundation"`.
    pub async fn chain(&self) -> Result<String, MonitorError> {
        self.call_string("parity_chain").await
    }

    /// `eth_blockNumber`.
    pub async fn block_number(&self) -> Result<BigUint, MonitorError> {
        self.call_quantity("eth_blockNumber").await
    }

    /// `eth_gasPrice`, in wei.
    pub async fn gas_price(&self) -> Result<BigUint, MonitorError> {
        self.call_quantity("eth_gasPrice").await
    }

    /// `eth_hashrate`, in hashes per second.
    pub async fn hash_rate(&self) -> Result<BigUint, MonitorError> {
        self.call_quantity("eth_hashrate").await
    }

    /// `eth_getBlockByNumber(number, true)`.
    ///
    /// Fails outright only when the call itself fails. Field-level problems
    /// (missing or malformed `timestamp`, `transactions`, `gasLimit`) are
    /// collected in [`PartialBlock::errors`] while the remaining fields are
    /// still returned.
    pub async fn block_by_number(&self, number: &BigUint) -> Result<PartialBlock, MonitorError> {
        let raw = self
            .call("eth_getBlockByNumber", json!([encode_quantity(number), true]))
            .await?;

        match raw {
            Value::Object(fields) => Ok(decode_block(&fields)),
            other => Err(DecodeError::new(
                "eth_getBlockByNumber",
                other.to_string(),
                "expected a block object",
            )
            .into()),
        }
    }

    /// `eth_syncing`.
    ///
    /// Returns `None` when the node reports `false` (not syncing). Progress
    /// is all-or-nothing: one malformed field fails the whole call.
    pub async fn sync_status(&self) -> Result<Option<SyncProgress>, MonitorError> {
        let raw = self.call("eth_syncing", json!([])).await?;
        Ok(decode_sync_status(raw)?)
    }
}

fn decode_block(fields: &Map<String, Value>) -> PartialBlock {
    let mut partial = PartialBlock::default();

    match hex_field(fields, "timestamp") {
        Ok(ts) => match quantity_to_u64("timestamp", &ts) {
            Ok(secs) => partial.block.timestamp = Some(BlockSnapshot::timestamp_from_secs(secs)),
            Err(e) => partial.errors.push(e.into()),
        },
        Err(e) => partial.errors.push(e.into()),
    }

    match fields.get("transactions") {
        Some(Value::Array(txs)) => partial.block.transaction_count = Some(txs.len()),
        Some(other) => partial.errors.push(
            DecodeError::new("transactions", other.to_string(), "expected an array").into(),
        ),
        None => partial.errors.push(DecodeError::missing("transactions").into()),
    }

    match hex_field(fields, "gasLimit") {
        Ok(limit) => partial.block.gas_limit = Some(limit),
        Err(e) => partial.errors.push(e.into()),
    }

    partial
}

fn decode_sync_status(raw: Value) -> Result<Option<SyncProgress>, DecodeError> {
    let fields = match raw {
        Value::Bool(_) => return Ok(None),
        Value::Object(fields) => fields,
        other => {
            return Err(DecodeError::new(
                "eth_syncing",
                other.to_string(),
                "expected a bool or an object",
            ));
        }
    };

    Ok(Some(SyncProgress {
        current_block: hex_field(&fields, "currentBlock")?,
        highest_block: hex_field(&fields, "highestBlock")?,
        starting_block: hex_field(&fields, "startingBlock")?,
        warp_chunks_amount: hex_field(&fields, "warpChunksAmount")?,
        warp_chunks_processed: hex_field(&fields, "warpChunksProcessed")?,
    }))
}

fn hex_field(fields: &Map<String, Value>, name: &str) -> Result<BigUint, DecodeError> {
    match fields.get(name) {
        Some(Value::String(literal)) => decode_quantity(name, literal),
        Some(other) => Err(DecodeError::new(name, other.to_string(), "expected a hex string")),
        None => Err(DecodeError::missing(name)),
    }
}
