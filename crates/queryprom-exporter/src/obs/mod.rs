//! Exporter self-observability.
//!
//! `metrics` holds the exporter's own counters, rendered on `/metrics` next to
//! the query-derived metrics. `logging` installs the tracing subscriber.

pub mod logging;
pub mod metrics;

pub use metrics::ExporterMetrics;
