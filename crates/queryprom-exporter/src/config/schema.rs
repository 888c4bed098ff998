use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use queryprom_core::error::{QueryPromError, Result};

/// Poll interval used when a metric omits `timeout` or sets it to zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config document as written by the operator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigRoot {
    #[serde(default)]
    pub driver: String,

    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

/// One `metrics` entry before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MetricSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub result_field: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metric_type: String,
    #[serde(default)]
    pub update: UpdateMode,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    ClickHouse,
    Postgres,
}

impl Driver {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clickhouse" => Some(Driver::ClickHouse),
            "postgre" | "postgres" | "postgresql" => Some(Driver::Postgres),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Driver::ClickHouse => "clickhouse",
            Driver::Postgres => "postgre",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricKind {
    Counter,
    #[default]
    Gauge,
}

impl MetricKind {
    /// Unrecognized values fall back to `Gauge`.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "counter" => MetricKind::Counter,
            _ => MetricKind::Gauge,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// How a polled value is applied to an existing series.
///
/// `Add` accumulates on every poll, for gauges too. `Set` replaces the gauge
/// value; counters always accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    #[default]
    Add,
    Set,
}

/// Validated, immutable description of one polled metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub name: String,
    pub help: String,
    pub timeout: Duration,
    pub result_field: String,
    pub labels: BTreeMap<String, String>,
    pub kind: MetricKind,
    pub update: UpdateMode,
    pub query: String,
}

/// Config after validation; the only shape pollers ever see.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub driver: Driver,
    pub metrics: Vec<MetricDefinition>,
}

impl ConfigRoot {
    /// Check the document and produce the validated config. `self` is untouched.
    pub fn validate(&self) -> Result<ExporterConfig> {
        let driver = Driver::parse(&self.driver)
            .ok_or_else(|| QueryPromError::InvalidDriver(self.driver.clone()))?;

        if self.metrics.is_empty() {
            return Err(QueryPromError::NoMetricsDefined);
        }

        let metrics = self
            .metrics
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.validate(index))
            .collect::<Result<Vec<_>>>()?;

        Ok(ExporterConfig { driver, metrics })
    }
}

impl MetricSpec {
    pub fn validate(&self, index: usize) -> Result<MetricDefinition> {
        if self.name.trim().is_empty() {
            return Err(QueryPromError::MissingName { index });
        }
        if self.query.trim().is_empty() {
            return Err(QueryPromError::MissingQuery {
                metric: self.name.clone(),
            });
        }
        if self.result_field.trim().is_empty() {
            return Err(QueryPromError::MissingResultField {
                metric: self.name.clone(),
            });
        }

        let timeout = match self.timeout {
            Some(t) if !t.is_zero() => t,
            _ => DEFAULT_TIMEOUT,
        };
        // Exposition requires a help line.
        let help = if self.help.trim().is_empty() {
            self.name.clone()
        } else {
            self.help.clone()
        };

        Ok(MetricDefinition {
            name: self.name.clone(),
            help,
            timeout,
            result_field: self.result_field.clone(),
            labels: self.labels.clone(),
            kind: MetricKind::parse_or_default(&self.metric_type),
            update: self.update,
            query: self.query.clone(),
        })
    }
}

/// `timeout` accepts integer seconds or a duration string such as `"30s"`.
fn deserialize_timeout<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Seconds(s)) => Ok(Some(Duration::from_secs(s))),
        Some(Raw::Text(s)) => humantime::parse_duration(s.trim())
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid timeout {s:?}: {e}"))),
    }
}
