//! The connect/poll state machine.
//!
//! While disconnected, each tick tries to resolve the node's chain and the
//! matching reference oracle. While connected, each tick runs a gather
//! cycle and commits the result. A transport failure of any node call drops
//! the session so the next tick resolves the chain again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gather::{CallError, PollResult, blocks_behind, gather, gauges, node_unreachable};
use super::state::{EngineStatus, NodeIdentity, SyncState};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::metrics::MetricsSink;
use crate::reference::{ReferenceClient, ReferenceTable};
use crate::rpc::transport::build_http_client;
use crate::rpc::hex::quantity_to_f64;
use crate::rpc::{BlockSnapshot, RpcClient};

enum Connection {
    Disconnected,
    Connected {
        identity: NodeIdentity,
        reference: ReferenceClient,
    },
}

/// Periodic poller for one node.
///
/// All session state (identity, last block, synced flag) is owned here and
/// only mutated from [`PollEngine::tick`].
pub struct PollEngine {
    rpc: RpcClient,
    references: ReferenceTable,
    sink: Arc<dyn MetricsSink>,
    interval: Duration,
    connection: Connection,
    last_block: Option<BlockSnapshot>,
    synced: bool,
    status: watch::Sender<EngineStatus>,
}

impl PollEngine {
    pub fn new(
        rpc: RpcClient,
        references: ReferenceTable,
        sink: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        let (status, _) = watch::channel(EngineStatus::default());
        Self {
            rpc,
            references,
            sink,
            interval,
            connection: Connection::Disconnected,
            last_block: None,
            synced: false,
            status,
        }
    }

    /// Builds an engine for the node and Etherscan references in `config`.
    pub fn from_config(
        config: &MonitorConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self, MonitorError> {
        let client = build_http_client(config.request_timeout)?;
        let rpc = RpcClient::with_client(client.clone(), config.endpoint.clone());
        let references = ReferenceTable::etherscan(client, config.etherscan_api_key.as_deref());
        Ok(Self::new(rpc, references, sink, config.rpc_interval))
    }

    /// Receiver for the status published after every tick.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    pub fn sync_state(&self) -> SyncState {
        SyncState::new(self.identity().is_some(), self.synced)
    }

    pub fn identity(&self) -> Option<&NodeIdentity> {
        match &self.connection {
            Connection::Connected { identity, .. } => Some(identity),
            Connection::Disconnected => None,
        }
    }

    pub fn reference_url(&self) -> Option<&str> {
        match &self.connection {
            Connection::Connected { reference, .. } => Some(reference.url()),
            Connection::Disconnected => None,
        }
    }

    pub fn last_block(&self) -> Option<&BlockSnapshot> {
        self.last_block.as_ref()
    }

    /// Ticks every `interval` until `cancel` fires.
    ///
    /// Ticks stay on the nominal `start + k * interval` schedule. A cycle
    /// that overruns its period skips the ticks it covered and the next one
    /// starts at the following nominal tick. Cancellation drops an in-flight
    /// cycle before it commits anything.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let period = self.interval.max(Duration::from_millis(1));
        let anchor = Instant::now() + period;
        let mut next = anchor;

        info!(endpoint = %self.rpc.endpoint(), interval = ?self.interval, "starting monitor");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = time::sleep_until(next) => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.tick() => {}
            }

            let due = next + period;
            next = next_nominal_tick(anchor, period, Instant::now());
            if next > due {
                debug!(
                    overrun = ?(Instant::now() - due),
                    "cycle overran its period, skipping ticks"
                );
            }
        }

        info!("monitor shutting down");
    }

    /// Runs one step of the state machine.
    pub async fn tick(&mut self) {
        let reference = match &self.connection {
            Connection::Connected { reference, .. } => Some(reference.clone()),
            Connection::Disconnected => None,
        };

        match reference {
            None => self.connect().await,
            Some(reference) => {
                let result = gather(&self.rpc, &reference).await;
                let errors = self.commit(result);
                self.handle_errors(&errors);
            }
        }

        self.publish();
    }

    async fn connect(&mut self) {
        match self.resolve_identity().await {
            Ok((identity, reference)) => {
                info!(
                    chain = %identity.chain,
                    reference = %reference.url(),
                    "chain connected, gathering metrics"
                );
                self.connection = Connection::Connected { identity, reference };
            }
            Err(e) => warn!(error = %e, "failed to connect to node"),
        }
    }

    async fn resolve_identity(&self) -> Result<(NodeIdentity, ReferenceClient), MonitorError> {
        let chain = self.rpc.chain().await?;
        let reference = self.references.client_for(&chain)?;
        Ok((NodeIdentity { chain }, reference))
    }

    /// Records gauges and updates session state from one cycle's values.
    ///
    /// Synchronous so that a cancelled tick either commits everything or
    /// nothing.
    fn commit(&mut self, result: PollResult) -> Vec<CallError> {
        let PollResult {
            peers,
            block_number,
            block,
            gas_price,
            hash_rate,
            sync,
            reference_height,
            errors,
        } = result;

        if let Some(peers) = peers {
            self.gauge(gauges::PEERS, peers as f64);
        }
        if let Some(number) = &block_number {
            self.gauge(gauges::BLOCK_NUMBER, quantity_to_f64(number));
        }
        if let Some(price) = &gas_price {
            self.gauge(gauges::GAS_PRICE, quantity_to_f64(price));
        }
        if let Some(rate) = &hash_rate {
            self.gauge(gauges::HASH_RATE, quantity_to_f64(rate));
        }
        if let Some(progress) = sync {
            self.gauge(gauges::SYNCING, if progress.is_some() { 1.0 } else { 0.0 });
            if let Some(progress) = progress {
                self.gauge(gauges::HIGHEST_BLOCK, quantity_to_f64(&progress.highest_block));
            }
        }

        if let Some(block) = block {
            if let Some(count) = block.transaction_count {
                self.gauge(gauges::TRANSACTIONS, count as f64);
            }
            if let Some(limit) = &block.gas_limit {
                self.gauge(gauges::GAS_LIMIT, quantity_to_f64(limit));
            }
            let block_time = self
                .last_block
                .as_ref()
                .and_then(|prev| block.seconds_since(prev));
            if let Some(block_time) = block_time {
                self.gauge(gauges::BLOCK_TIME, block_time);
            }
            self.last_block = Some(block);
        }

        if let (Some(reference), Some(local)) = (reference_height, block_number) {
            self.gauge(gauges::BLOCKS_BEHIND, blocks_behind(&reference, &local));
            self.synced = reference == local;
            self.gauge(gauges::SYNCED, if self.synced { 1.0 } else { 0.0 });
        }

        errors
    }

    fn handle_errors(&mut self, errors: &[CallError]) {
        if errors.is_empty() {
            debug!("gather cycle complete");
            return;
        }

        let summary = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        warn!(count = errors.len(), errors = %summary, "export errors");

        if node_unreachable(errors) {
            warn!("node may be down, dropping session");
            self.disconnect();
        }
    }

    fn disconnect(&mut self) {
        self.connection = Connection::Disconnected;
        self.last_block = None;
        self.synced = false;
    }

    fn gauge(&self, name: &str, value: f64) {
        self.sink.set_gauge(&[name], value);
    }

    fn publish(&self) {
        self.status.send_replace(EngineStatus {
            state: self.sync_state(),
            chain: self.identity().map(|id| id.chain.clone()),
        });
    }
}

/// First tick of the `anchor + k * period` schedule strictly after `now`.
fn next_nominal_tick(anchor: Instant, period: Duration, now: Instant) -> Instant {
    let period_ns = period.as_nanos().max(1);
    let elapsed_ns = now.saturating_duration_since(anchor).as_nanos();
    let ticks = elapsed_ns / period_ns + 1;
    let offset = u64::try_from(ticks * period_ns).unwrap_or(u64::MAX);
    anchor + Duration::from_nanos(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use num_bigint::BigUint;
    use serde_json::{Value, json};

    use crate::engine::gather::Call;
    use crate::error::{DecodeError, TransportError};
    use crate::rpc::Transport;

    /// Sink that keeps every write, in order.
    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<(String, f64)>>,
    }

    impl RecordingSink {
        fn values(&self, name: &str) -> Vec<f64> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .collect()
        }
    }

    impl MetricsSink for RecordingSink {
        fn set_gauge(&self, key: &[&str], value: f64) {
            self.writes.lock().unwrap().push((key.join("."), value));
        }
    }

    fn offline_engine(sink: Arc<RecordingSink>) -> PollEngine {
        let rpc = RpcClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let references = ReferenceTable::etherscan(reqwest::Client::new(), None);
        PollEngine::new(rpc, references, sink, Duration::from_secs(5))
    }

    fn block_at(secs: u64) -> BlockSnapshot {
        BlockSnapshot {
            timestamp: Some(BlockSnapshot::timestamp_from_secs(secs)),
            transaction_count: Some(3),
            gas_limit: Some(BigUint::from(8_000_000u64)),
        }
    }

    fn heights(local: u64, reference: u64) -> PollResult {
        PollResult {
            block_number: Some(BigUint::from(local)),
            reference_height: Some(BigUint::from(reference)),
            ..Default::default()
        }
    }

    #[test]
    fn block_time_needs_two_snapshots() {
        let sink = Arc::new(RecordingSink::default());
        let mut engine = offline_engine(sink.clone());

        engine.commit(PollResult {
            block: Some(block_at(1_000)),
            ..Default::default()
        });
        assert!(sink.values(gauges::BLOCK_TIME).is_empty());
        assert_eq!(engine.last_block(), Some(&block_at(1_000)));

        engine.commit(PollResult {
            block: Some(block_at(1_015)),
            ..Default::default()
        });
        assert_eq!(sink.values(gauges::BLOCK_TIME), vec![15.0]);
        assert_eq!(engine.last_block(), Some(&block_at(1_015)));
    }

    #[test]
    fn failed_block_fetch_keeps_previous_snapshot() {
        let sink = Arc::new(RecordingSink::default());
        let mut engine = offline_engine(sink.clone());

        engine.commit(PollResult {
            block: Some(block_at(1_000)),
            ..Default::default()
        });
        engine.commit(PollResult::default());
        engine.commit(PollResult {
            block: Some(block_at(1_030)),
            ..Default::default()
        });

        assert_eq!(sink.values(gauges::BLOCK_TIME), vec![30.0]);
    }

    #[test]
    fn synced_flag_follows_blocks_behind() {
        let sink = Arc::new(RecordingSink::default());
        let mut engine = offline_engine(sink.clone());

        engine.commit(heights(20, 20));
        assert!(engine.synced);

        engine.commit(heights(20, 22));
        assert!(!engine.synced);

        engine.commit(heights(21, 21));
        assert!(engine.synced);

        // Reference lagging behind the node is not special-cased.
        engine.commit(heights(25, 24));
        assert!(!engine.synced);

        assert_eq!(sink.values(gauges::BLOCKS_BEHIND), vec![0.0, 2.0, 0.0, -1.0]);
        assert_eq!(sink.values(gauges::SYNCED), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_reference_leaves_synced_flag_alone() {
        let sink = Arc::new(RecordingSink::default());
        let mut engine = offline_engine(sink.clone());

        engine.commit(heights(20, 20));
        engine.commit(PollResult {
            block_number: Some(BigUint::from(21u64)),
            ..Default::default()
        });

        assert!(engine.synced);
        assert_eq!(sink.values(gauges::BLOCKS_BEHIND), vec![0.0]);
        assert_eq!(sink.values(gauges::BLOCK_NUMBER), vec![20.0, 21.0]);
    }

    #[test]
    fn transport_error_drops_the_session_and_decode_error_does_not() {
        let sink = Arc::new(RecordingSink::default());
        let mut engine = offline_engine(sink);
        let connected = || Connection::Connected {
            identity: NodeIdentity { chain: "kovan".into() },
            reference: ReferenceClient::new(reqwest::Client::new(), "http://127.0.0.1:1"),
        };

        engine.connection = connected();
        engine.synced = true;
        engine.handle_errors(&[CallError {
            call: Call::BlockNumber,
            error: DecodeError::new("eth_blockNumber", "0xzz", "invalid digit").into(),
        }]);
        assert_eq!(engine.sync_state(), SyncState::ConnectedSynced);

        engine.last_block = Some(block_at(1_000));
        engine.handle_errors(&[CallError {
            call: Call::PeerCount,
            error: TransportError::Connect {
                url: "http://127.0.0.1:1".into(),
                reason: "connection refused".into(),
            }
            .into(),
        }]);
        assert_eq!(engine.sync_state(), SyncState::Disconnected);
        assert!(engine.identity().is_none());
        assert!(engine.last_block().is_none());
    }

    // ---------------------------
    // Against mock node + oracle
    // ---------------------------

    struct MockNode {
        server: ServerGuard,
        mocks: Vec<Mock>,
    }

    impl MockNode {
        async fn new() -> Self {
            Self {
                server: Server::new_async().await,
                mocks: Vec::new(),
            }
        }

        async fn result(&mut self, method: &str, result: Value) {
            let mock = self
                .server
                .mock("POST", "/")
                .match_body(Matcher::PartialJson(json!({ "method": method })))
                .with_status(200)
                .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
                .create_async()
                .await;
            self.mocks.push(mock);
        }

        async fn reference(&mut self, height: &str) {
            let mock = self
                .server
                .mock("GET", "/reference")
                .with_status(200)
                .with_body(json!({ "jsonrpc": "2.0", "id": 83, "result": height }).to_string())
                .create_async()
                .await;
            self.mocks.push(mock);
        }

        async fn healthy(&mut self, local: &str, reference: &str, timestamp: &str) {
            self.result("parity_chain", json!("kovan")).await;
            self.result("net_peerCount", json!("0x4")).await;
            self.result("eth_blockNumber", json!(local)).await;
            self.result(
                "eth_getBlockByNumber",
                json!({ "timestamp": timestamp, "transactions": [], "gasLimit": "0x7a1200" }),
            )
            .await;
            self.result("eth_gasPrice", json!("0x3b9aca00")).await;
            self.result("eth_hashrate", json!("0x0")).await;
            self.result("eth_syncing", json!(false)).await;
            self.reference(reference).await;
        }

        async fn reset(&mut self) {
            for mock in self.mocks.drain(..) {
                mock.remove_async().await;
            }
        }

        fn engine(&self, sink: Arc<RecordingSink>) -> PollEngine {
            let rpc = RpcClient::new(self.server.url(), Duration::from_secs(2)).unwrap();
            let references = ReferenceTable::new(
                reqwest::Client::new(),
                [("kovan", format!("{}/reference", self.server.url()))],
            );
            PollEngine::new(rpc, references, sink, Duration::from_secs(5))
        }
    }

    #[tokio::test]
    async fn kovan_node_two_blocks_behind() {
        let mut node = MockNode::new().await;
        node.healthy("0x10", "0x12", "0x5c7a1f00").await;

        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink.clone());
        let status = engine.subscribe();

        engine.tick().await;
        assert_eq!(engine.sync_state(), SyncState::ConnectedUnsynced);
        assert_eq!(engine.identity().map(|id| id.chain.as_str()), Some("kovan"));
        assert_eq!(
            engine.reference_url(),
            Some(format!("{}/reference", node.server.url()).as_str())
        );

        engine.tick().await;
        assert_eq!(sink.values(gauges::BLOCK_NUMBER), vec![16.0]);
        assert_eq!(sink.values(gauges::BLOCKS_BEHIND), vec![2.0]);
        assert_eq!(sink.values(gauges::PEERS), vec![4.0]);
        assert_eq!(sink.values(gauges::SYNCING), vec![0.0]);
        assert!(sink.values(gauges::BLOCK_TIME).is_empty());
        assert_eq!(engine.sync_state(), SyncState::ConnectedUnsynced);
        assert_eq!(
            *status.borrow(),
            EngineStatus {
                state: SyncState::ConnectedUnsynced,
                chain: Some("kovan".into()),
            }
        );
    }

    #[tokio::test]
    async fn consecutive_cycles_record_block_time_and_sync() {
        let mut node = MockNode::new().await;
        node.healthy("0x10", "0x12", "0x64").await;

        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink.clone());
        engine.tick().await; // connect
        engine.tick().await;

        node.reset().await;
        node.healthy("0x12", "0x12", "0x72").await;
        engine.tick().await;

        assert_eq!(sink.values(gauges::BLOCK_TIME), vec![14.0]);
        assert_eq!(engine.sync_state(), SyncState::ConnectedSynced);
    }

    #[tokio::test]
    async fn unsupported_chain_stays_disconnected() {
        let mut node = MockNode::new().await;
        node.result("parity_chain", json!("morden")).await;

        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink.clone());

        engine.tick().await;
        engine.tick().await;

        assert_eq!(engine.sync_state(), SyncState::Disconnected);
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn node_failure_while_connected_disconnects() {
        let mut node = MockNode::new().await;
        node.healthy("0x10", "0x10", "0x64").await;

        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink);
        engine.tick().await;
        engine.tick().await;
        assert_eq!(engine.sync_state(), SyncState::ConnectedSynced);

        node.reset().await;
        let bad_gateway = node
            .server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;
        node.mocks.push(bad_gateway);
        node.reference("0x10").await;

        engine.tick().await;
        assert_eq!(engine.sync_state(), SyncState::Disconnected);
        assert!(engine.last_block().is_none());

        // Node comes back: next tick resolves the chain again.
        node.reset().await;
        node.healthy("0x11", "0x11", "0x70").await;
        engine.tick().await;
        assert_eq!(engine.sync_state(), SyncState::ConnectedUnsynced);
    }

    #[tokio::test]
    async fn malformed_node_values_keep_the_session() {
        let mut node = MockNode::new().await;
        node.result("parity_chain", json!("kovan")).await;
        node.result("net_peerCount", json!("0xnotanumber")).await;
        node.result("eth_blockNumber", json!("0x10")).await;
        node.result("eth_getBlockByNumber", json!({ "transactions": [] })).await;
        node.result("eth_gasPrice", json!("0x1")).await;
        node.result("eth_hashrate", json!("0x0")).await;
        node.result("eth_syncing", json!(false)).await;
        node.reference("0x10").await;

        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink.clone());
        engine.tick().await;
        engine.tick().await;

        assert_eq!(engine.sync_state(), SyncState::ConnectedSynced);
        assert!(sink.values(gauges::PEERS).is_empty());
        assert_eq!(sink.values(gauges::TRANSACTIONS), vec![0.0]);
        assert!(sink.values(gauges::GAS_LIMIT).is_empty());
    }

    #[tokio::test]
    async fn reference_outage_keeps_the_session() {
        let mut node = MockNode::new().await;
        node.result("parity_chain", json!("kovan")).await;
        node.result("net_peerCount", json!("0x4")).await;
        node.result("eth_blockNumber", json!("0x10")).await;
        node.result(
            "eth_getBlockByNumber",
            json!({ "timestamp": "0x1", "transactions": [], "gasLimit": "0x1" }),
        )
        .await;
        node.result("eth_gasPrice", json!("0x1")).await;
        node.result("eth_hashrate", json!("0x0")).await;
        node.result("eth_syncing", json!(false)).await;
        let outage = node
            .server
            .mock("GET", "/reference")
            .with_status(500)
            .create_async()
            .await;
        node.mocks.push(outage);

        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink.clone());
        engine.tick().await;
        engine.tick().await;

        assert_eq!(engine.sync_state(), SyncState::ConnectedUnsynced);
        assert!(sink.values(gauges::BLOCKS_BEHIND).is_empty());
        assert_eq!(sink.values(gauges::BLOCK_NUMBER), vec![16.0]);
    }

    #[test]
    fn next_nominal_tick_skips_covered_ticks() {
        let anchor = Instant::now();
        let period = Duration::from_millis(100);
        let at = |ms| anchor + Duration::from_millis(ms);

        assert_eq!(next_nominal_tick(anchor, period, at(3)), at(100));
        assert_eq!(next_nominal_tick(anchor, period, at(100)), at(200));
        assert_eq!(next_nominal_tick(anchor, period, at(350)), at(400));
    }

    // ---------------------------
    // Scheduling, on the paused clock
    // ---------------------------

    /// In-process node and oracle with canned replies. Delays sleep on the
    /// tokio clock, so paused-time tests are exact.
    #[derive(Debug, Default)]
    struct ScriptedNode {
        results: Mutex<HashMap<String, Value>>,
        delays: Mutex<HashMap<String, Duration>>,
        reference: Mutex<String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedNode {
        fn set(&self, method: &str, result: Value) {
            self.results.lock().unwrap().insert(method.to_string(), result);
        }

        fn delay(&self, method: &str, by: Duration) {
            self.delays.lock().unwrap().insert(method.to_string(), by);
        }

        fn healthy(&self, local: &str, reference: &str, timestamp: &str) {
            self.set("parity_chain", json!("kovan"));
            self.set("net_peerCount", json!("0x4"));
            self.set("eth_blockNumber", json!(local));
            self.set(
                "eth_getBlockByNumber",
                json!({ "timestamp": timestamp, "transactions": [], "gasLimit": "0x7a1200" }),
            );
            self.set("eth_gasPrice", json!("0x3b9aca00"));
            self.set("eth_hashrate", json!("0x0"));
            self.set("eth_syncing", json!(false));
            *self.reference.lock().unwrap() = reference.to_string();
        }

        /// Start offsets of every call to `method`, relative to `start`.
        fn call_offsets(&self, method: &str, start: Instant) -> Vec<Duration> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, at)| *at - start)
                .collect()
        }

        fn engine(self: &Arc<Self>, sink: Arc<RecordingSink>, interval: Duration) -> PollEngine {
            let transport: Arc<dyn Transport> = self.clone();
            let rpc = RpcClient::with_transport(transport.clone(), "http://node");
            let references =
                ReferenceTable::with_transport(transport, [("kovan", "http://reference")]);
            PollEngine::new(rpc, references, sink, interval)
        }
    }

    #[async_trait]
    impl Transport for ScriptedNode {
        async fn post_json(&self, _url: &str, body: &Value) -> Result<String, TransportError> {
            let method = body["method"].as_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push((method.clone(), Instant::now()));

            let delay = self.delays.lock().unwrap().get(&method).copied();
            if let Some(delay) = delay {
                time::sleep(delay).await;
            }

            let result = self.results.lock().unwrap().get(&method).cloned();
            Ok(json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string())
        }

        async fn get(&self, _url: &str) -> Result<String, TransportError> {
            let height = self.reference.lock().unwrap().clone();
            Ok(json!({ "jsonrpc": "2.0", "id": 83, "result": height }).to_string())
        }
    }

    fn millis(offsets: &[u64]) -> Vec<Duration> {
        offsets.iter().copied().map(Duration::from_millis).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_stay_on_nominal_schedule() {
        let node = Arc::new(ScriptedNode::default());
        // Unknown chain: every tick is one identity lookup.
        node.set("parity_chain", json!("morden"));
        node.delay("parity_chain", Duration::from_millis(30));
        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink, Duration::from_millis(100));

        let start = Instant::now();
        let cancel = CancellationToken::new();
        let stop = async {
            time::sleep(Duration::from_millis(1_050)).await;
            cancel.cancel();
        };
        tokio::join!(engine.run(cancel.clone()), stop);

        assert_eq!(
            node.call_offsets("parity_chain", start),
            millis(&[100, 200, 300, 400, 500, 600, 700, 800, 900, 1_000])
        );
        assert_eq!(engine.sync_state(), SyncState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycle_waits_for_next_nominal_tick() {
        let node = Arc::new(ScriptedNode::default());
        node.healthy("0x10", "0x10", "0x64");
        node.delay("eth_getBlockByNumber", Duration::from_millis(250));
        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink, Duration::from_millis(100));

        let start = Instant::now();
        let cancel = CancellationToken::new();
        let stop = async {
            time::sleep(Duration::from_millis(950)).await;
            cancel.cancel();
        };
        tokio::join!(engine.run(cancel.clone()), stop);

        // Connect at 100. The cycle at 200 runs until 450, covering the tick
        // at 300 and 400; the next one starts at 500, never mid-cycle.
        assert_eq!(node.call_offsets("parity_chain", start), millis(&[100]));
        assert_eq!(
            node.call_offsets("eth_blockNumber", start),
            millis(&[200, 500, 800])
        );
        assert_eq!(
            node.call_offsets("eth_getBlockByNumber", start),
            millis(&[200, 500, 800])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_cycle_commits_nothing() {
        let node = Arc::new(ScriptedNode::default());
        node.healthy("0x10", "0x10", "0x64");
        let sink = Arc::new(RecordingSink::default());
        let mut engine = node.engine(sink.clone(), Duration::from_millis(100));

        let start = Instant::now();
        let cancel = CancellationToken::new();
        let script = async {
            // Connect at 100, one full cycle at 200.
            time::sleep(Duration::from_millis(250)).await;
            node.set("eth_blockNumber", json!("0x11"));
            node.set(
                "eth_getBlockByNumber",
                json!({ "timestamp": "0x72", "transactions": ["0xab"], "gasLimit": "0x7a1200" }),
            );
            node.delay("eth_getBlockByNumber", Duration::from_millis(500));
            // The cycle at 300 is stuck on the block fetch.
            time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        };
        tokio::join!(engine.run(cancel.clone()), script);

        assert_eq!(node.call_offsets("eth_blockNumber", start), millis(&[200, 300]));
        assert_eq!(
            engine.last_block(),
            Some(&BlockSnapshot {
                timestamp: Some(BlockSnapshot::timestamp_from_secs(0x64)),
                transaction_count: Some(0),
                gas_limit: Some(BigUint::from(8_000_000u64)),
            })
        );
        assert_eq!(engine.sync_state(), SyncState::ConnectedSynced);
        assert_eq!(sink.values(gauges::BLOCK_NUMBER), vec![16.0]);
        assert_eq!(sink.values(gauges::SYNCED), vec![1.0]);
        assert!(sink.values(gauges::BLOCK_TIME).is_empty());
    }
}
