use std::collections::HashMap;
use std::sync::Arc;

use super::row::Row;
use crate::types::RowValues;

/// Rows returned by a statement.
///
/// Column names are stored once and shared with every [`Row`].
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<Row>,
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_columns(columns: Vec<String>) -> ResultSet {
        // First occurrence wins for duplicate names, like the engine's own lookup.
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        ResultSet {
            rows: Vec::new(),
            columns: Arc::new(columns),
            index: Arc::new(index),
        }
    }

    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(Row::new(
            Arc::clone(&self.columns),
            Arc::clone(&self.index),
            values,
        ));
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
