//! Metric registry shared by every poller.
//!
//! The registry is an explicit handle passed to each poller at construction.
//! Registration is insert-if-absent under one mutex: the first poller to
//! register a name wins, any later attempt gets `RegistrationConflict`.
//! Entries are never removed. Updates to a registered series go through the
//! lock-free prometheus vectors and never take the registry lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use prometheus::core::Collector;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

use queryprom_core::error::{QueryPromError, Result};
use queryprom_core::LabelSchema;

use crate::config::{MetricDefinition, MetricKind, UpdateMode};

enum Series {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// A metric owned by exactly one poller.
pub struct RegisteredMetric {
    name: String,
    kind: MetricKind,
    update: UpdateMode,
    schema: LabelSchema,
    series: Series,
}

impl RegisteredMetric {
    fn build(def: &MetricDefinition, schema: LabelSchema) -> Result<Self> {
        let opts = Opts::new(def.name.clone(), def.help.clone()).const_labels(
            def.labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let label_names: Vec<&str> = schema.names().iter().map(String::as_str).collect();
        let rejected = |e: prometheus::Error| QueryPromError::Registration {
            metric: def.name.clone(),
            reason: e.to_string(),
        };

        let series = match def.kind {
            MetricKind::Counter => Series::Counter(CounterVec::new(opts, &label_names).map_err(rejected)?),
            MetricKind::Gauge => Series::Gauge(GaugeVec::new(opts, &label_names).map_err(rejected)?),
        };

        Ok(Self {
            name: def.name.clone(),
            kind: def.kind,
            update: def.update,
            schema,
            series,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn schema(&self) -> &LabelSchema {
        &self.schema
    }

    /// Apply one observation to the series identified by `label_values`.
    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        let bad_labels = |e: prometheus::Error| QueryPromError::Scan {
            metric: self.name.clone(),
            reason: e.to_string(),
        };
        match &self.series {
            Series::Counter(vec) => {
                vec.get_metric_with_label_values(label_values)
                    .map_err(bad_labels)?
                    .inc_by(value);
            }
            Series::Gauge(vec) => {
                let gauge = vec
                    .get_metric_with_label_values(label_values)
                    .map_err(bad_labels)?;
                match self.update {
                    UpdateMode::Add => gauge.add(value),
                    UpdateMode::Set => gauge.set(value),
                }
            }
        }
        Ok(())
    }

    /// Current value of one series, `None` if it was never observed.
    ///
    /// Reads the collected samples, so an unseen label tuple is not created.
    pub fn value(&self, label_values: &[&str]) -> Option<f64> {
        if label_values.len() != self.schema.len() {
            return None;
        }
        let families = self.collector().collect();
        let sample = families.iter().flat_map(|f| f.get_metric()).find(|m| {
            self.schema.names().iter().zip(label_values).all(|(name, value)| {
                m.get_label()
                    .iter()
                    .any(|pair| pair.get_name() == name.as_str() && pair.get_value() == *value)
            })
        })?;
        Some(match self.kind {
            MetricKind::Counter => sample.get_counter().get_value(),
            MetricKind::Gauge => sample.get_gauge().get_value(),
        })
    }

    fn collector(&self) -> Box<dyn Collector> {
        match &self.series {
            Series::Counter(vec) => Box::new(vec.clone()),
            Series::Gauge(vec) => Box::new(vec.clone()),
        }
    }
}

impl fmt::Debug for RegisteredMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMetric")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("update", &self.update)
            .field("labels", &self.schema.names())
            .finish()
    }
}

#[derive(Clone)]
pub struct MetricRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    entries: Mutex<HashMap<String, Arc<RegisteredMetric>>>,
    exposition: Registry,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(HashMap::new()),
                exposition: Registry::new(),
            }),
        }
    }

    /// Register `def` with the given dynamic label schema.
    ///
    /// Succeeds once per name; later calls return `RegistrationConflict`.
    pub fn register(&self, def: &MetricDefinition, schema: LabelSchema) -> Result<Arc<RegisteredMetric>> {
        let metric = RegisteredMetric::build(def, schema)?;

        // The map is consistent after every statement, so a poisoned lock is safe to reuse.
        let mut entries = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&def.name) {
            return Err(QueryPromError::RegistrationConflict {
                metric: def.name.clone(),
            });
        }

        self.inner
            .exposition
            .register(metric.collector())
            .map_err(|e| match e {
                prometheus::Error::AlreadyReg => QueryPromError::RegistrationConflict {
                    metric: def.name.clone(),
                },
                other => QueryPromError::Registration {
                    metric: def.name.clone(),
                    reason: other.to_string(),
                },
            })?;

        let metric = Arc::new(metric);
        entries.insert(def.name.clone(), Arc::clone(&metric));
        Ok(metric)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredMetric>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing exposition registry, for the exporter's own metrics.
    pub fn exposition(&self) -> &Registry {
        &self.inner.exposition
    }

    /// Encode every registered family in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let families = self.inner.exposition.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(|e| QueryPromError::Internal(format!("encode metrics failed: {e}")))?;
        String::from_utf8(buf).map_err(|e| QueryPromError::Internal(format!("metrics not utf-8: {e}")))
    }
}
