//! Exporter config loader (strict parsing + validation).

pub mod options;
pub mod schema;

use std::fs;

use queryprom_core::error::{QueryPromError, Result};

pub use options::{parse_error_status, LogFormat, Options};
pub use schema::{
    ConfigRoot, Driver, ExporterConfig, MetricDefinition, MetricKind, MetricSpec, UpdateMode,
    DEFAULT_TIMEOUT,
};

pub fn load_from_file(path: &str) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| QueryPromError::InvalidConfig(format!("read {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let root: ConfigRoot = serde_yaml::from_str(s)
        .map_err(|e| QueryPromError::InvalidConfig(format!("invalid yaml: {e}")))?;
    root.validate()
}
