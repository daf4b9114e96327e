use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// A single row of a [`ResultSet`](super::ResultSet).
///
/// Column names and the name-to-index map are shared by every row of the set.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    values: Vec<RowValues>,
}

impl Row {
    pub(crate) fn new(
        columns: Arc<Vec<String>>,
        index: Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            columns,
            index,
            values,
        }
    }

    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.index
            .get(column_name)
            .copied()
            .or_else(|| self.columns.iter().position(|col| col == column_name))
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}
