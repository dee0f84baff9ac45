//! Wire envelopes and decoded node values.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use num_bigint::BigUint;
use serde::Deserialize;
use serde_json::Value;

use crate::error::MonitorError;

/// JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC 2.0 response envelope.
///
/// `result` is kept opaque; the typed accessors decode it.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<Value, MonitorError> {
        match self.error {
            Some(err) => Err(MonitorError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

/// The fields of a block the engine cares about.
///
/// Each field is independently optional: nodes routinely return partial
/// blocks and callers use whatever is present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockSnapshot {
    pub timestamp: Option<SystemTime>,
    pub transaction_count: Option<usize>,
    pub gas_limit: Option<BigUint>,
}

impl BlockSnapshot {
    /// Builds a timestamp from epoch seconds.
    pub fn timestamp_from_secs(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// Seconds elapsed from `earlier` to `self`, negative if `self` is older.
    ///
    /// Returns `None` unless both snapshots carry a timestamp.
    pub fn seconds_since(&self, earlier: &BlockSnapshot) -> Option<f64> {
        let (now, then) = (self.timestamp?, earlier.timestamp?);
        Some(match now.duration_since(then) {
            Ok(forward) => forward.as_secs_f64(),
            Err(backward) => -backward.duration().as_secs_f64(),
        })
    }
}

/// Result of `eth_getBlockByNumber`: whatever could be decoded, plus one
/// error per field that could not.
#[derive(Debug, Default)]
pub struct PartialBlock {
    pub block: BlockSnapshot,
    pub errors: Vec<MonitorError>,
}

/// Sync progress reported by `eth_syncing` while a sync is running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncProgress {
    pub current_block: BigUint,
    pub highest_block: BigUint,
    pub starting_block: BigUint,
    pub warp_chunks_amount: BigUint,
    pub warp_chunks_processed: BigUint,
}
