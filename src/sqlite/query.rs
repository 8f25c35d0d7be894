use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use super::params::{BoundParams, BoundValue};
use crate::error::QueryFnError;
use crate::executor::{RowFlow, RowHandler};
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `QueryFnError` if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, QueryFnError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Bind encoded parameters to a prepared statement.
///
/// Named placeholders (`:name`, `@name`, `$name`) are looked up without their prefix.
/// Supplied names the statement does not use are ignored.
///
/// # Errors
///
/// Returns `QueryFnError::ParameterError` on a positional count mismatch, a placeholder
/// with no supplied value, or a positional placeholder given named parameters.
pub fn bind_params(stmt: &mut Statement<'_>, params: &BoundParams) -> Result<(), QueryFnError> {
    let expected = stmt.parameter_count();
    match params {
        BoundParams::Positional(values) => {
            if values.len() != expected {
                return Err(QueryFnError::ParameterError(format!(
                    "statement expects {expected} parameter(s), {} supplied",
                    values.len()
                )));
            }
            for (idx, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(idx + 1, value)?;
            }
        }
        BoundParams::Named(values) => {
            for idx in 1..=expected {
                let Some(placeholder) = stmt.parameter_name(idx).map(str::to_owned) else {
                    return Err(QueryFnError::ParameterError(format!(
                        "placeholder {idx} is positional but named parameters were supplied"
                    )));
                };
                let key = placeholder.trim_start_matches([':', '@', '$']);
                let value: &BoundValue = values
                    .iter()
                    .find_map(|(name, value)| (name == key).then_some(value))
                    .ok_or_else(|| {
                        QueryFnError::ParameterError(format!("no value supplied for `{placeholder}`"))
                    })?;
                stmt.raw_bind_parameter(idx, value)?;
            }
        }
    }
    Ok(())
}

/// Bind and run `stmt`, handing each row to `on_row` until it returns [`RowFlow::Stop`].
///
/// Returns the number of rows handed over.
///
/// # Errors
///
/// Returns binding or driver errors, or the first error from `on_row`.
pub fn for_each_row(
    stmt: &mut Statement<'_>,
    params: &BoundParams,
    on_row: &mut RowHandler<'_>,
) -> Result<usize, QueryFnError> {
    let template = ResultSet::new(column_names(stmt));
    let col_count = template.column_names().len();

    bind_params(stmt, params)?;
    let mut rows = stmt.raw_query();
    let mut seen = 0;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            values.push(sqlite_extract_value_sync(row, i)?);
        }
        seen += 1;
        if on_row(template.row(values))? == RowFlow::Stop {
            break;
        }
    }
    Ok(seen)
}

/// Build a result set from a `SQLite` query
///
/// # Errors
/// Returns `QueryFnError` if binding, execution or result processing fails.
pub fn build_result_set(stmt: &mut Statement<'_>, params: &BoundParams) -> Result<ResultSet, QueryFnError> {
    let mut result_set = ResultSet::with_capacity(column_names(stmt), 10);
    for_each_row(stmt, params, &mut |row| {
        result_set.add_row_values(row.into_values());
        Ok(RowFlow::Continue)
    })?;
    Ok(result_set)
}

fn column_names(stmt: &Statement<'_>) -> Arc<Vec<String>> {
    Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

/// Bind and run a statement that returns no rows.
///
/// # Errors
/// Returns `QueryFnError` if binding or execution fails.
pub fn execute_bound(stmt: &mut Statement<'_>, params: &BoundParams) -> Result<usize, QueryFnError> {
    bind_params(stmt, params)?;
    Ok(stmt.raw_execute()?)
}
