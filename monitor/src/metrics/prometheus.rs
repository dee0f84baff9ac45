//! Prometheus-backed gauge sink.
//!
//! Gauge names are only known when the engine first writes them, so each
//! gauge is registered lazily into a private [`Registry`] on first use.
//! [`PrometheusSink::gather_text`] renders the registry in the Prometheus
//! text exposition format for the `/metrics?format=prometheus` route.

use std::collections::HashMap;
use std::sync::Mutex;

use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};

use super::sink::{MetricsSink, gauge_name};

/// Gauge sink that records into a Prometheus registry.
pub struct PrometheusSink {
    registry: Registry,
    gauges: Mutex<HashMap<String, Gauge>>,
}

impl PrometheusSink {
    /// Creates a sink whose metrics are prefixed with `namespace`
    /// (usually the node name), sanitised to a valid metric prefix.
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let prefix = sanitize_metric_name(namespace);
        let prefix = (!prefix.is_empty()).then_some(prefix);
        let registry = Registry::new_custom(prefix, None)?;
        Ok(Self {
            registry,
            gauges: Mutex::new(HashMap::new()),
        })
    }

    fn gauge(&self, key: &[&str]) -> Result<Gauge, prometheus::Error> {
        let mut gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        let name = gauge_name(key);
        if let Some(gauge) = gauges.get(&name) {
            return Ok(gauge.clone());
        }

        let gauge = Gauge::with_opts(Opts::new(
            sanitize_metric_name(&name),
            format!("Node gauge {name}"),
        ))?;
        self.registry.register(Box::new(gauge.clone()))?;
        gauges.insert(name, gauge.clone());
        Ok(gauge)
    }

    /// Encodes all gauges into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl MetricsSink for PrometheusSink {
    fn set_gauge(&self, key: &[&str], value: f64) {
        match self.gauge(key) {
            Ok(gauge) => gauge.set(value),
            Err(e) => {
                tracing::warn!(gauge = %gauge_name(key), error = %e, "failed to register gauge")
            }
        }
    }
}

/// Maps arbitrary text onto `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn sanitize_metric_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
