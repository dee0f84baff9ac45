//! Connection and sync state published by the poll engine.

use serde::Serialize;

/// Chain identity reported by the node for the current session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeIdentity {
    pub chain: String,
}

/// Coarse health of the monitored node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    /// No session with the node (initial state, or after a transport failure).
    #[default]
    Disconnected,
    /// Session established but the node is not level with the reference.
    ConnectedUnsynced,
    /// Node height equals the reference height.
    ConnectedSynced,
}

impl SyncState {
    pub fn new(connected: bool, synced: bool) -> Self {
        match (connected, synced) {
            (false, _) => SyncState::Disconnected,
            (true, false) => SyncState::ConnectedUnsynced,
            (true, true) => SyncState::ConnectedSynced,
        }
    }

    pub fn is_connected(self) -> bool {
        self != SyncState::Disconnected
    }

    pub fn is_synced(self) -> bool {
        self == SyncState::ConnectedSynced
    }
}

/// Snapshot published after every tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub state: SyncState,
    /// Resolved chain name, present only while connected.
    pub chain: Option<String>,
}
