//! One gather cycle: the per-tick metric collection while connected.
//!
//! All calls are independent reads and are issued concurrently. Nothing here
//! touches engine state; the engine commits a [`PollResult`] in one step
//! once every call has returned.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;

use crate::error::MonitorError;
use crate::reference::ReferenceClient;
use crate::rpc::{BlockSnapshot, RpcClient, SyncProgress};

/// Gauge names emitted by the engine. Dashboards depend on these.
pub mod gauges {
    pub const PEERS: &str = "peers";
    pub const BLOCK_NUMBER: &str = "blockNumber";
    pub const BLOCK_TIME: &str = "blocktime";
    pub const BLOCKS_BEHIND: &str = "blocksbehind";
    pub const GAS_PRICE: &str = "gasPrice";
    pub const HASH_RATE: &str = "hashRate";
    pub const GAS_LIMIT: &str = "gasLimit";
    pub const TRANSACTIONS: &str = "transactions";
    pub const SYNCING: &str = "syncing";
    pub const HIGHEST_BLOCK: &str = "highestBlock";
    pub const SYNCED: &str = "synced";
}

/// The call a gather error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    PeerCount,
    BlockNumber,
    Block,
    GasPrice,
    HashRate,
    SyncStatus,
    Reference,
}

impl Call {
    /// Whether the call went to the monitored node (as opposed to the
    /// reference oracle).
    pub fn is_node_call(self) -> bool {
        self != Call::Reference
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Call::PeerCount => "net_peerCount",
            Call::BlockNumber => "eth_blockNumber",
            Call::Block => "eth_getBlockByNumber",
            Call::GasPrice => "eth_gasPrice",
            Call::HashRate => "eth_hashrate",
            Call::SyncStatus => "eth_syncing",
            Call::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// A failure of one call within a gather cycle.
#[derive(Debug)]
pub struct CallError {
    pub call: Call,
    pub error: MonitorError,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.call, self.error)
    }
}

/// Returns `true` if any node call failed at the transport level.
///
/// Reference oracle outages are not a signal about the node.
pub fn node_unreachable(errors: &[CallError]) -> bool {
    errors
        .iter()
        .any(|e| e.call.is_node_call() && e.error.is_transport())
}

/// Values collected in one cycle. Each field is `None` if its call failed.
#[derive(Debug, Default)]
pub struct PollResult {
    pub peers: Option<u64>,
    pub block_number: Option<BigUint>,
    pub block: Option<BlockSnapshot>,
    pub gas_price: Option<BigUint>,
    pub hash_rate: Option<BigUint>,
    /// `Some(None)` means the node reported no sync in progress.
    pub sync: Option<Option<SyncProgress>>,
    pub reference_height: Option<BigUint>,
    pub errors: Vec<CallError>,
}

impl PollResult {
    fn take<T>(&mut self, call: Call, result: Result<T, MonitorError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push(CallError { call, error });
                None
            }
        }
    }
}

/// Runs every call of one cycle and collects values and errors.
pub async fn gather(rpc: &RpcClient, reference: &ReferenceClient) -> PollResult {
    // The block fetch needs the height, so these two run back to back.
    let height_then_block = async {
        match rpc.block_number().await {
            Ok(number) => {
                let block = rpc.block_by_number(&number).await;
                (Ok(number), Some(block))
            }
            Err(e) => (Err(e), None),
        }
    };

    let (peers, (block_number, block), gas_price, hash_rate, sync, reference_height) = tokio::join!(
        rpc.peer_count(),
        height_then_block,
        rpc.gas_price(),
        rpc.hash_rate(),
        rpc.sync_status(),
        reference.current_height(),
    );

    let mut result = PollResult::default();
    result.peers = result.take(Call::PeerCount, peers);
    result.block_number = result.take(Call::BlockNumber, block_number);
    if let Some(partial) = block.and_then(|b| result.take(Call::Block, b)) {
        result.errors.extend(
            partial
                .errors
                .into_iter()
                .map(|error| CallError { call: Call::Block, error }),
        );
        result.block = Some(partial.block);
    }
    result.gas_price = result.take(Call::GasPrice, gas_price);
    result.hash_rate = result.take(Call::HashRate, hash_rate);
    result.sync = result.take(Call::SyncStatus, sync);
    result.reference_height = result.take(Call::Reference, reference_height);
    result
}

/// `reference - local` as a gauge value. Negative when the reference lags.
pub fn blocks_behind(reference: &BigUint, local: &BigUint) -> f64 {
    let lag = BigInt::from(reference.clone()) - BigInt::from(local.clone());
    lag.to_f64().unwrap_or(f64::NAN)
}
