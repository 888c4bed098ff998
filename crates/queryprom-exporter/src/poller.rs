//! Per-metric poll loop.
//!
//! One `MetricPoller` per metric definition, each on its own task:
//! connect -> query -> resolve labels -> register once -> scan -> publish ->
//! release -> sleep, forever. The first failure of any step stops the poller
//! for the rest of the process; there is no retry.
//!
//! Observations of one cycle are buffered and only published once every row
//! has been scanned and coerced, so a failing cycle publishes nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use queryprom_core::error::{QueryPromError, Result};
use queryprom_core::{coerce, LabelSchema};

use crate::config::MetricDefinition;
use crate::obs::ExporterMetrics;
use crate::registry::{MetricRegistry, RegisteredMetric};
use crate::source::{Connection, Connector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Connecting,
    Querying,
    Publishing,
    Sleeping,
    /// Terminal; the poller never runs again.
    Stopped,
}

impl PollerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PollerState::Connecting => "connecting",
            PollerState::Querying => "querying",
            PollerState::Publishing => "publishing",
            PollerState::Sleeping => "sleeping",
            PollerState::Stopped => "stopped",
        }
    }
}

/// Current state of every poller, keyed by its position in the config.
#[derive(Clone, Default)]
pub struct PollerBoard {
    states: Arc<DashMap<usize, (String, PollerState)>>,
}

impl PollerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: usize, metric: &str, state: PollerState) {
        self.states.insert(id, (metric.to_string(), state));
    }

    pub fn state(&self, id: usize) -> Option<PollerState> {
        self.states.get(&id).map(|e| e.value().1)
    }

    /// Pollers not yet stopped.
    pub fn running(&self) -> usize {
        self.states
            .iter()
            .filter(|e| e.value().1 != PollerState::Stopped)
            .count()
    }

    /// `(id, metric, state)` ordered by id.
    pub fn snapshot(&self) -> Vec<(usize, String, PollerState)> {
        let mut out: Vec<_> = self
            .states
            .iter()
            .map(|e| (*e.key(), e.value().0.clone(), e.value().1))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollReport {
    pub rows: usize,
    pub elapsed: Duration,
}

pub struct MetricPoller {
    id: usize,
    def: Arc<MetricDefinition>,
    connector: Arc<dyn Connector>,
    registry: MetricRegistry,
    metrics: Arc<ExporterMetrics>,
    board: PollerBoard,
    registered: Option<Arc<RegisteredMetric>>,
}

impl MetricPoller {
    pub fn new(
        id: usize,
        def: Arc<MetricDefinition>,
        connector: Arc<dyn Connector>,
        registry: MetricRegistry,
        metrics: Arc<ExporterMetrics>,
        board: PollerBoard,
    ) -> Self {
        board.set(id, &def.name, PollerState::Connecting);
        Self {
            id,
            def,
            connector,
            registry,
            metrics,
            board,
            registered: None,
        }
    }

    /// Loop until the first failure; returns the error that stopped the poller.
    pub async fn run(mut self) -> QueryPromError {
        debug!(metric = %self.def.name, timeout = ?self.def.timeout, "poller started");
        loop {
            match self.poll_once().await {
                Ok(report) => {
                    debug!(metric = %self.def.name, rows = report.rows, elapsed = ?report.elapsed, "poll complete");
                    self.set_state(PollerState::Sleeping);
                    tokio::time::sleep(self.def.timeout).await;
                }
                Err(e) => {
                    error!(metric = %self.def.name, code = e.code().as_str(), error = %e, "poller stopped");
                    self.metrics.record_failure(&self.def.name, e.code());
                    self.set_state(PollerState::Stopped);
                    return e;
                }
            }
        }
    }

    /// One full cycle. Nothing is published unless every step succeeds.
    pub async fn poll_once(&mut self) -> Result<PollReport> {
        let started = Instant::now();
        let name = self.def.name.clone();

        self.set_state(PollerState::Connecting);
        debug!(metric = %name, driver = %self.connector.driver(), "connecting");
        let mut conn = self
            .connector
            .connect()
            .await
            .map_err(|e| QueryPromError::Connect {
                metric: name.clone(),
                reason: e.to_string(),
            })?;

        self.set_state(PollerState::Querying);
        let mut rows = conn
            .query(&self.def.query)
            .await
            .map_err(|e| QueryPromError::Query {
                metric: name.clone(),
                reason: e.to_string(),
            })?;

        let columns = rows.columns().map_err(|e| QueryPromError::Columns {
            metric: name.clone(),
            reason: e.to_string(),
        })?;
        let schema = LabelSchema::resolve_for(&name, &columns, &self.def.result_field)?;
        let metric = self.ensure_registered(schema, &columns)?;

        let field = self.def.result_field.as_str();
        let mut observations: Vec<(Vec<String>, f64)> = Vec::new();
        while let Some(row) = rows.next_row() {
            let row = row.map_err(|e| QueryPromError::Scan {
                metric: name.clone(),
                reason: e.to_string(),
            })?;
            let label_values = metric.schema().label_values(&name, &row)?;
            let cell = row.get(field).ok_or_else(|| QueryPromError::Scan {
                metric: name.clone(),
                reason: format!("row carries no {field} column"),
            })?;
            let value = coerce(&name, field, cell)?;
            observations.push((label_values, value));
        }

        self.set_state(PollerState::Publishing);
        for (label_values, value) in &observations {
            let label_values: Vec<&str> = label_values.iter().map(String::as_str).collect();
            metric.observe(&label_values, *value)?;
        }

        drop(rows);
        release(&name, conn).await;

        let elapsed = started.elapsed();
        self.metrics
            .record_poll(&name, observations.len() as u64, elapsed);
        Ok(PollReport {
            rows: observations.len(),
            elapsed,
        })
    }

    /// Register on the first successful cycle; reuse the handle afterwards.
    ///
    /// Later cycles keep the first schema; extra columns are reported and ignored.
    fn ensure_registered(
        &mut self,
        schema: LabelSchema,
        columns: &[String],
    ) -> Result<Arc<RegisteredMetric>> {
        if let Some(metric) = &self.registered {
            let extra = metric.schema().extra_columns(columns, &self.def.result_field);
            if !extra.is_empty() {
                warn!(metric = %self.def.name, ?extra, "columns outside the registered label schema are ignored");
            }
            return Ok(Arc::clone(metric));
        }

        debug!(metric = %self.def.name, "registering metric");
        let metric = self.registry.register(&self.def, schema)?;
        info!(
            metric = %self.def.name,
            kind = metric.kind().as_str(),
            labels = ?metric.schema().names(),
            "metric registered"
        );
        self.registered = Some(Arc::clone(&metric));
        Ok(metric)
    }

    fn set_state(&self, state: PollerState) {
        self.board.set(self.id, &self.def.name, state);
    }
}

async fn release(metric: &str, conn: Box<dyn Connection>) {
    if let Err(e) = conn.close().await {
        warn!(metric = %metric, error = %e, "closing connection failed");
    }
}
