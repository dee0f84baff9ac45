//! JSON-RPC access to the monitored node.
//!
//! [`RpcClient`] performs the request/response exchange and decodes results
//! into typed values; [`hex`] holds the numeric quantity codec shared with
//! the reference oracle. Both go through a [`Transport`].

pub mod client;
pub mod hex;
pub mod transport;
pub mod types;

pub use client::RpcClient;
pub use transport::{HttpTransport, Transport};
pub use hex::{decode_quantity, encode_quantity};
pub use types::{BlockSnapshot, PartialBlock, SyncProgress};
