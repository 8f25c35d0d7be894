use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// Column name to position lookup shared by every row of one result.
pub(crate) type ColumnIndex = Arc<HashMap<String, usize>>;

pub(crate) fn build_column_index(column_names: &[String]) -> ColumnIndex {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        // the first of several same-named columns wins
        index.entry(name.clone()).or_insert(i);
    }
    Arc::new(index)
}

/// A row from a database query result
///
/// Column names and the name lookup are shared with the other rows of the same result.
#[derive(Debug, Clone)]
pub struct DbRow {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
    column_index: ColumnIndex,
}

impl DbRow {
    /// Create a row, building its own column lookup.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let column_index = build_column_index(&column_names);
        Self {
            column_names,
            values,
            column_index,
        }
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: ColumnIndex,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let names = Arc::new(vec!["id".to_string(), "name".to_string(), "id".to_string()]);
        let row = DbRow::new(
            names,
            vec![RowValues::Int(1), RowValues::Text("a".into()), RowValues::Int(2)],
        );
        assert_eq!(row.get("name"), Some(&RowValues::Text("a".into())));
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(2), Some(&RowValues::Int(2)));
        assert_eq!(row.len(), 3);
    }
}
