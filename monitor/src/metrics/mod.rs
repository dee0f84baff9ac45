//! Metrics sinks for the exporter.
//!
//! The poll engine records gauges through the [`MetricsSink`] trait and never
//! reads them back. A typical node fans out to both sinks:
//!
//! ```ignore
//! use std::sync::Arc;
//! use monitor::metrics::{FanoutSink, InMemorySink, MetricsSink, PrometheusSink};
//!
//! let memory = Arc::new(InMemorySink::new());
//! let prometheus = Arc::new(PrometheusSink::new("parity")?);
//! let sinks: Vec<Arc<dyn MetricsSink>> = vec![memory.clone(), prometheus.clone()];
//! let sink: Arc<dyn MetricsSink> = Arc::new(FanoutSink::new(sinks));
//! ```

pub mod prometheus;
pub mod sink;

pub use self::prometheus::PrometheusSink;
pub use sink::{FanoutSink, GaugeValue, InMemorySink, MetricsSink, gauge_name};
