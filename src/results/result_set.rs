use std::sync::Arc;

use super::row::{ColumnIndex, DbRow, build_column_index};
use crate::types::RowValues;

/// A result set from a database query
///
/// Rows keep raw driver values; decoding into records happens afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<DbRow>,
    column_names: Arc<Vec<String>>,
    column_index: ColumnIndex,
}

impl ResultSet {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(column_names: Arc<Vec<String>>, capacity: usize) -> Self {
        let column_index = build_column_index(&column_names);
        Self {
            results: Vec::with_capacity(capacity),
            column_names,
            column_index,
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Wrap values in a row sharing this result's columns, without storing it.
    pub(crate) fn row(&self, row_values: Vec<RowValues>) -> DbRow {
        DbRow::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            row_values,
        )
    }

    /// Add a row to the result set
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let row = self.row(row_values);
        self.results.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DbRow> {
        self.results.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = DbRow;
    type IntoIter = std::vec::IntoIter<DbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a DbRow;
    type IntoIter = std::slice::Iter<'a, DbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
