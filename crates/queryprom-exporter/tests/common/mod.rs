//! In-memory connector used by the poller tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use queryprom_core::{PollRow, Scalar};
use queryprom_exporter::config::{Driver, MetricDefinition, MetricKind, UpdateMode};
use queryprom_exporter::obs::ExporterMetrics;
use queryprom_exporter::poller::{MetricPoller, PollerBoard};
use queryprom_exporter::registry::MetricRegistry;
use queryprom_exporter::source::{Connection, Connector, DriverError, DriverResult, ResultRows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Never,
    Connect,
    Query,
    Columns,
    /// Fail decoding the row at this index.
    Scan(usize),
}

#[derive(Debug, Clone)]
pub struct Script {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
    pub fail_at: FailAt,
}

impl Script {
    pub fn new(columns: &[&str], rows: Vec<Vec<Scalar>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            fail_at: FailAt::Never,
        }
    }

    pub fn failing(mut self, at: FailAt) -> Self {
        self.fail_at = at;
        self
    }
}

/// `[("a", 3), ("b", 5)]` as `table, cnt`.
pub fn table_counts(counts: &[(&str, u64)]) -> Script {
    Script::new(
        &["table", "cnt"],
        counts
            .iter()
            .map(|(t, c)| vec![Scalar::Text(t.to_string()), Scalar::UInt64(*c)])
            .collect(),
    )
}

#[derive(Clone)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    panic_on: Option<String>,
    pub connects: Arc<AtomicUsize>,
    pub queries: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            panic_on: None,
            connects: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Panic inside `query` for any SQL containing `marker`.
    pub fn panicking_on(mut self, marker: &str) -> Self {
        self.panic_on = Some(marker.to_string());
        self
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn driver(&self) -> Driver {
        Driver::ClickHouse
    }

    async fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        if script.fail_at == FailAt::Connect {
            return Err(DriverError::new("connection refused"));
        }
        Ok(Box::new(ScriptedConnection {
            script,
            panic_on: self.panic_on.clone(),
            queries: Arc::clone(&self.queries),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct ScriptedConnection {
    script: Script,
    panic_on: Option<String>,
    queries: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn query(&mut self, sql: &str) -> DriverResult<Box<dyn ResultRows>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.panic_on {
            if sql.contains(marker.as_str()) {
                panic!("driver bug on {sql:?}");
            }
        }
        if self.script.fail_at == FailAt::Query {
            return Err(DriverError::new("syntax error"));
        }
        Ok(Box::new(ScriptedRows {
            script: self.script.clone(),
            next: 0,
        }))
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedRows {
    script: Script,
    next: usize,
}

impl ResultRows for ScriptedRows {
    fn columns(&self) -> DriverResult<Vec<String>> {
        if self.script.fail_at == FailAt::Columns {
            return Err(DriverError::new("no column metadata"));
        }
        Ok(self.script.columns.clone())
    }

    fn next_row(&mut self) -> Option<DriverResult<PollRow>> {
        let index = self.next;
        let cells = self.script.rows.get(index)?.clone();
        self.next += 1;
        if self.script.fail_at == FailAt::Scan(index) {
            return Some(Err(DriverError::new("truncated row")));
        }
        Some(Ok(PollRow::from_columns(&self.script.columns, cells)))
    }
}

pub fn definition(name: &str, result_field: &str) -> MetricDefinition {
    MetricDefinition {
        name: name.to_string(),
        help: format!("{name} help"),
        timeout: Duration::from_millis(10),
        result_field: result_field.to_string(),
        labels: BTreeMap::new(),
        kind: MetricKind::Gauge,
        update: UpdateMode::Add,
        query: "SELECT table, cnt FROM t".to_string(),
    }
}

/// Registry, self-metrics and status board as the exporter wires them.
pub struct Harness {
    pub registry: MetricRegistry,
    pub metrics: Arc<ExporterMetrics>,
    pub board: PollerBoard,
}

impl Harness {
    pub fn new() -> Self {
        let registry = MetricRegistry::new();
        let metrics = Arc::new(ExporterMetrics::new(registry.exposition()).unwrap());
        Self {
            registry,
            metrics,
            board: PollerBoard::new(),
        }
    }

    pub fn poller(&self, id: usize, def: MetricDefinition, connector: &ScriptedConnector) -> MetricPoller {
        MetricPoller::new(
            id,
            Arc::new(def),
            Arc::new(connector.clone()),
            self.registry.clone(),
            Arc::clone(&self.metrics),
            self.board.clone(),
        )
    }
}
