//! Result modes: what a call returns and how rows are shaped.
//!
//! | Mode | Returns |
//! |---|---|
//! | [`FetchAll`] | every row as a record |
//! | [`OneOrNone`] | the first row, or `None` |
//! | [`ScalarOrNone`] | first column of the first row, or `None` (also for NULL) |
//! | [`FetchScalars`] | first column of every row |
//! | [`Iterate`] | records handed over one at a time as they are read |
//! | [`IterateScalars`] | first-column values handed over one at a time |
//! | [`Execute`] | number of rows changed |
//!
//! Every mode takes the connection explicitly, runs the query function, and never commits.
//! A cancelled call returns the mode's empty value without touching the connection.

mod execute;
mod fetch;
mod scalar;

pub use execute::Execute;
pub use fetch::{FetchAll, Iterate, OneOrNone};
pub use scalar::{FetchScalars, IterateScalars, ScalarOrNone};

use crate::decode::FromValue;
use crate::error::QueryFnError;
use crate::results::DbRow;

/// Capacity of the channel between the driver thread and a streaming consumer.
pub const STREAM_BUFFER: usize = 64;

/// Decode the first column of a row as a scalar.
fn first_column<T: FromValue>(row: DbRow) -> Result<T, QueryFnError> {
    let value = row.into_values().into_iter().next().ok_or_else(|| {
        QueryFnError::DecodeError("scalar result has no columns".into())
    })?;
    T::from_value(value)
}

#[allow(clippy::cast_possible_truncation)]
fn count<T>(items: &[T]) -> u64 {
    items.len() as u64
}
