//! Result scalars and their coercion into observations.
//!
//! Driver adapters decode every result cell into a [`Scalar`]; the engine
//! never inspects driver-native types. Only unsigned integers are accepted as
//! observations, every other variant is usable as a label value only.

use std::fmt;

use crate::error::{QueryPromError, Result};

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    /// Any signed integer, whatever its width on the wire.
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Short type name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::UInt8(_) => "uint8",
            Scalar::UInt16(_) => "uint16",
            Scalar::UInt32(_) => "uint32",
            Scalar::UInt64(_) => "uint64",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "text",
            Scalar::Bytes(_) => "bytes",
        }
    }

    /// Widen an unsigned integer to `f64`. Values above 2^53 lose precision.
    pub fn as_observation(&self) -> Option<f64> {
        match *self {
            Scalar::UInt8(v) => Some(f64::from(v)),
            Scalar::UInt16(v) => Some(f64::from(v)),
            Scalar::UInt32(v) => Some(f64::from(v)),
            Scalar::UInt64(v) => Some(v as f64),
            _ => None,
        }
    }
}

/// Label-value rendering: verbatim, `Null` as the empty string.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::UInt8(v) => write!(f, "{v}"),
            Scalar::UInt16(v) => write!(f, "{v}"),
            Scalar::UInt32(v) => write!(f, "{v}"),
            Scalar::UInt64(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(v) => f.write_str(v),
            Scalar::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

/// Coerce the result field of `metric` into an observation.
pub fn coerce(metric: &str, field: &str, value: &Scalar) -> Result<f64> {
    value
        .as_observation()
        .ok_or_else(|| QueryPromError::UnsupportedResultType {
            metric: metric.to_string(),
            field: field.to_string(),
            kind: value.kind(),
        })
}
