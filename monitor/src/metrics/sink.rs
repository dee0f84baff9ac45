//! Gauge sinks.
//!
//! The engine only ever writes gauges, so the sink surface is a single
//! method. Sinks are shared between the poll task and the HTTP handlers and
//! must be `Send + Sync`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::Serialize;

/// Write-only gauge recorder injected into the poll engine.
pub trait MetricsSink: Send + Sync {
    /// Sets the gauge identified by the path-like `key` to `value`.
    fn set_gauge(&self, key: &[&str], value: f64);
}

/// Joins a gauge key into its flat name (`["sync", "highestBlock"]` becomes
/// `sync.highestBlock`).
pub fn gauge_name(key: &[&str]) -> String {
    key.join(".")
}

/// A gauge value as last recorded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GaugeValue {
    pub value: f64,
    pub updated_at: SystemTime,
}

/// Keeps the latest value of every gauge in memory.
///
/// Backs the JSON view of `/metrics`.
#[derive(Default)]
pub struct InMemorySink {
    gauges: RwLock<HashMap<String, GaugeValue>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value of `key`, if it was ever set.
    pub fn get(&self, key: &[&str]) -> Option<f64> {
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        gauges.get(&gauge_name(key)).map(|g| g.value)
    }

    /// All gauges sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, GaugeValue> {
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        gauges.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl MetricsSink for InMemorySink {
    fn set_gauge(&self, key: &[&str], value: f64) {
        let mut gauges = self.gauges.write().unwrap_or_else(|e| e.into_inner());
        gauges.insert(
            gauge_name(key),
            GaugeValue {
                value,
                updated_at: SystemTime::now(),
            },
        );
    }
}

/// Forwards every write to each inner sink.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }
}

impl MetricsSink for FanoutSink {
    fn set_gauge(&self, key: &[&str], value: f64) {
        for sink in &self.sinks {
            sink.set_gauge(key, value);
        }
    }
}
