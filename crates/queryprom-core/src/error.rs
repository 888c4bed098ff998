//! Shared error type across queryprom crates.

use thiserror::Error;

/// Stable error codes, used in logs and as the `stage` of failure metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Config document could not be read or parsed.
    InvalidConfig,
    /// Unrecognized database driver.
    InvalidDriver,
    /// Config carries no metric definitions.
    NoMetricsDefined,
    /// A metric definition has an empty name.
    MissingName,
    /// A metric definition has an empty query.
    MissingQuery,
    /// A metric definition has an empty result field.
    MissingResultField,
    /// Database connection failed.
    ConnectFailed,
    /// Query execution failed.
    QueryFailed,
    /// Result columns could not be enumerated or lack the result field.
    ColumnsFailed,
    /// A result row could not be decoded.
    ScanFailed,
    /// Result value is not an unsigned integer.
    UnsupportedResultType,
    /// A metric with the same name is already registered.
    RegistrationConflict,
    /// The exposition backend rejected the metric (bad name or label set).
    RegistrationFailed,
    /// A row no longer carries a column of the registered label schema.
    SchemaDrift,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::InvalidDriver => "INVALID_DRIVER",
            ErrorCode::NoMetricsDefined => "NO_METRICS_DEFINED",
            ErrorCode::MissingName => "MISSING_NAME",
            ErrorCode::MissingQuery => "MISSING_QUERY",
            ErrorCode::MissingResultField => "MISSING_RESULT_FIELD",
            ErrorCode::ConnectFailed => "CONNECT_FAILED",
            ErrorCode::QueryFailed => "QUERY_FAILED",
            ErrorCode::ColumnsFailed => "COLUMNS_FAILED",
            ErrorCode::ScanFailed => "SCAN_FAILED",
            ErrorCode::UnsupportedResultType => "UNSUPPORTED_RESULT_TYPE",
            ErrorCode::RegistrationConflict => "REGISTRATION_CONFLICT",
            ErrorCode::RegistrationFailed => "REGISTRATION_FAILED",
            ErrorCode::SchemaDrift => "SCHEMA_DRIFT",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Startup-fatal codes abort the process before any poller starts.
    pub fn is_startup_fatal(self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidConfig
                | ErrorCode::InvalidDriver
                | ErrorCode::NoMetricsDefined
                | ErrorCode::MissingName
                | ErrorCode::MissingQuery
                | ErrorCode::MissingResultField
        )
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, QueryPromError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum QueryPromError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported driver {0:?}, expected \"clickhouse\" or \"postgre\"")]
    InvalidDriver(String),
    #[error("config defines no metrics")]
    NoMetricsDefined,
    #[error("metric #{index} has no name")]
    MissingName { index: usize },
    #[error("metric {metric} has no query")]
    MissingQuery { metric: String },
    #[error("metric {metric} has no result field")]
    MissingResultField { metric: String },

    #[error("metric {metric}: cannot connect to database: {reason}")]
    Connect { metric: String, reason: String },
    #[error("metric {metric}: query failed: {reason}")]
    Query { metric: String, reason: String },
    #[error("metric {metric}: cannot determine columns: {reason}")]
    Columns { metric: String, reason: String },
    #[error("metric {metric}: result field {field} is not among the result columns")]
    ResultFieldMissing { metric: String, field: String },
    #[error("metric {metric}: cannot scan row: {reason}")]
    Scan { metric: String, reason: String },
    #[error("metric {metric}: result field {field} has unsupported type {kind}")]
    UnsupportedResultType {
        metric: String,
        field: String,
        kind: &'static str,
    },
    #[error("metric {metric}: already registered by another poller")]
    RegistrationConflict { metric: String },
    #[error("metric {metric}: registration rejected: {reason}")]
    Registration { metric: String, reason: String },
    #[error("metric {metric}: label column {column} missing from result row")]
    SchemaDrift { metric: String, column: String },

    #[error("internal: {0}")]
    Internal(String),
}

impl QueryPromError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryPromError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            QueryPromError::InvalidDriver(_) => ErrorCode::InvalidDriver,
            QueryPromError::NoMetricsDefined => ErrorCode::NoMetricsDefined,
            QueryPromError::MissingName { .. } => ErrorCode::MissingName,
            QueryPromError::MissingQuery { .. } => ErrorCode::MissingQuery,
            QueryPromError::MissingResultField { .. } => ErrorCode::MissingResultField,
            QueryPromError::Connect { .. } => ErrorCode::ConnectFailed,
            QueryPromError::Query { .. } => ErrorCode::QueryFailed,
            QueryPromError::Columns { .. } | QueryPromError::ResultFieldMissing { .. } => {
                ErrorCode::ColumnsFailed
            }
            QueryPromError::Scan { .. } => ErrorCode::ScanFailed,
            QueryPromError::UnsupportedResultType { .. } => ErrorCode::UnsupportedResultType,
            QueryPromError::RegistrationConflict { .. } => ErrorCode::RegistrationConflict,
            QueryPromError::Registration { .. } => ErrorCode::RegistrationFailed,
            QueryPromError::SchemaDrift { .. } => ErrorCode::SchemaDrift,
            QueryPromError::Internal(_) => ErrorCode::Internal,
        }
    }
}
