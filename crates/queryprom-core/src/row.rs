use std::collections::HashMap;

use crate::value::Scalar;

/// One decoded result row: column name -> cell.
///
/// Lives for a single poll cycle only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollRow {
    cells: HashMap<String, Scalar>,
}

impl PollRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair column names with the cells of one row, in order.
    pub fn from_columns(columns: &[String], cells: Vec<Scalar>) -> Self {
        columns.iter().cloned().zip(cells).collect()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Scalar) {
        self.cells.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.cells.get(column)
    }
}

impl FromIterator<(String, Scalar)> for PollRow {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}
