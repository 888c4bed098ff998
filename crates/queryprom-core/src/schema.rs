//! Label schema resolution.
//!
//! A label schema is the ordered list of result columns other than the
//! result field. Label values are read back in exactly this order, so the
//! order reported by the database is preserved.

use crate::error::{QueryPromError, Result};
use crate::row::PollRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSchema {
    names: Vec<String>,
}

impl LabelSchema {
    /// Derive the schema from result columns, dropping `result_field`.
    pub fn resolve(columns: &[String], result_field: &str) -> Self {
        let names = columns
            .iter()
            .filter(|c| c.as_str() != result_field)
            .cloned()
            .collect();
        Self { names }
    }

    /// Like [`LabelSchema::resolve`], but fails when the result field is not
    /// among the columns at all.
    pub fn resolve_for(metric: &str, columns: &[String], result_field: &str) -> Result<Self> {
        if !columns.iter().any(|c| c == result_field) {
            return Err(QueryPromError::ResultFieldMissing {
                metric: metric.to_string(),
                field: result_field.to_string(),
            });
        }
        Ok(Self::resolve(columns, result_field))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label values of `row` in schema order, each stringified verbatim.
    ///
    /// A schema column absent from the row is a drift error; columns the row
    /// carries beyond the schema are ignored.
    pub fn label_values(&self, metric: &str, row: &PollRow) -> Result<Vec<String>> {
        self.names
            .iter()
            .map(|name| {
                row.get(name)
                    .map(ToString::to_string)
                    .ok_or_else(|| QueryPromError::SchemaDrift {
                        metric: metric.to_string(),
                        column: name.clone(),
                    })
            })
            .collect()
    }

    /// Columns present in `columns` but unknown to this schema (result field excluded).
    pub fn extra_columns<'a>(&self, columns: &'a [String], result_field: &str) -> Vec<&'a str> {
        columns
            .iter()
            .filter(|c| c.as_str() != result_field && !self.names.contains(c))
            .map(String::as_str)
            .collect()
    }
}
