//! Shared application state for the exporter.
//!
//! Built once from the validated config; cloned into the HTTP handlers and
//! the supervisor. The registry inside is the same one every poller writes to.

use std::sync::Arc;

use queryprom_core::error::Result;

use crate::config::ExporterConfig;
use crate::obs::ExporterMetrics;
use crate::poller::PollerBoard;
use crate::registry::MetricRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    registry: MetricRegistry,
    metrics: Arc<ExporterMetrics>,
    board: PollerBoard,
}

impl AppState {
    /// Build application state.
    /// Fails only if the self-metrics cannot be registered.
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        let registry = MetricRegistry::new();
        let metrics = Arc::new(ExporterMetrics::new(registry.exposition())?);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                metrics,
                board: PollerBoard::new(),
            }),
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> MetricRegistry {
        self.inner.registry.clone()
    }

    pub fn metrics(&self) -> Arc<ExporterMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn board(&self) -> PollerBoard {
        self.inner.board.clone()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Ready while not draining and at least one poller is still alive.
    pub fn is_ready(&self) -> bool {
        !self.is_draining() && self.inner.board.running() > 0
    }
}
