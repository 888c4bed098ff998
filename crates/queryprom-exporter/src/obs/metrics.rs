//! The exporter's own metrics.
//!
//! Everything here is registered into the same exposition registry as the
//! query-derived metrics, under the `queryprom_` prefix. Poll durations are
//! recorded in seconds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

use queryprom_core::error::{ErrorCode, QueryPromError, Result};

const POLL_BUCKETS_SECS: [f64; 10] = [0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

pub struct ExporterMetrics {
    pub polls: IntCounterVec,
    pub poll_failures: IntCounterVec,
    pub rows_scanned: IntCounterVec,
    pub poll_duration: HistogramVec,
    pub pollers_running: IntGauge,
    draining_flag: IntGauge,
    draining: AtomicBool,
}

impl ExporterMetrics {
    /// Create and register every family into `registry`.
    pub fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self {
            polls: IntCounterVec::new(
                Opts::new("queryprom_polls_total", "Completed poll cycles per metric"),
                &["metric"],
            )
            .map_err(internal)?,
            poll_failures: IntCounterVec::new(
                Opts::new("queryprom_poll_failures_total", "Poller failures by metric and stage"),
                &["metric", "stage"],
            )
            .map_err(internal)?,
            rows_scanned: IntCounterVec::new(
                Opts::new("queryprom_rows_scanned_total", "Result rows turned into observations"),
                &["metric"],
            )
            .map_err(internal)?,
            poll_duration: HistogramVec::new(
                HistogramOpts::new("queryprom_poll_duration_seconds", "Duration of one poll cycle")
                    .buckets(POLL_BUCKETS_SECS.to_vec()),
                &["metric"],
            )
            .map_err(internal)?,
            pollers_running: IntGauge::new("queryprom_pollers_running", "Pollers that have not stopped")
                .map_err(internal)?,
            draining_flag: IntGauge::new("queryprom_draining", "1 once a shutdown signal was received")
                .map_err(internal)?,
            draining: AtomicBool::new(false),
        };

        registry.register(Box::new(metrics.polls.clone())).map_err(internal)?;
        registry.register(Box::new(metrics.poll_failures.clone())).map_err(internal)?;
        registry.register(Box::new(metrics.rows_scanned.clone())).map_err(internal)?;
        registry.register(Box::new(metrics.poll_duration.clone())).map_err(internal)?;
        registry.register(Box::new(metrics.pollers_running.clone())).map_err(internal)?;
        registry.register(Box::new(metrics.draining_flag.clone())).map_err(internal)?;
        Ok(metrics)
    }

    /// Record one successful cycle.
    pub fn record_poll(&self, metric: &str, rows: u64, elapsed: Duration) {
        self.polls.with_label_values(&[metric]).inc();
        self.rows_scanned.with_label_values(&[metric]).inc_by(rows);
        self.poll_duration
            .with_label_values(&[metric])
            .observe(elapsed.as_secs_f64());
    }

    /// Record the failure that stopped a poller.
    pub fn record_failure(&self, metric: &str, code: ErrorCode) {
        self.poll_failures
            .with_label_values(&[metric, code.as_str()])
            .inc();
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
        self.draining_flag.set(1);
    }
    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }
}

fn internal(e: prometheus::Error) -> QueryPromError {
    QueryPromError::Internal(format!("self-metrics registration failed: {e}"))
}
