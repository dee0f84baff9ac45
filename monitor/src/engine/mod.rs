//! Poll engine: connection state machine and metric derivation.
//!
//! - [`state`] holds the published status types,
//! - [`gather`] runs one cycle of node and reference calls,
//! - [`poll`] drives cycles on a fixed schedule and owns session state.

pub mod gather;
pub mod poll;
pub mod state;

pub use gather::{Call, CallError, PollResult, blocks_behind, gauges};
pub use poll::PollEngine;
pub use state::{EngineStatus, NodeIdentity, SyncState};
