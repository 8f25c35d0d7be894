//! The seam between result modes and a database connection.

use async_trait::async_trait;

use crate::error::QueryFnError;
use crate::results::{DbRow, ResultSet};
use crate::sqlite::PreparedCall;

/// Returned by a row callback to keep reading or stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlow {
    Continue,
    Stop,
}

/// Row callback used by [`Executor::query_rows`].
pub type RowHandler<'a> = dyn FnMut(DbRow) -> Result<RowFlow, QueryFnError> + 'a;

/// Blocking statement execution.
///
/// Implementations never commit; the caller owns transaction boundaries.
pub trait Executor {
    /// Whether `:name` placeholders can be bound.
    fn supports_named_placeholders(&self) -> bool;

    /// Run a row-returning statement, handing each raw row to `on_row` as it is read.
    ///
    /// # Errors
    ///
    /// Returns driver errors, parameter binding errors, or whatever `on_row` returns.
    fn query_rows(&self, call: &PreparedCall, on_row: &mut RowHandler<'_>) -> Result<(), QueryFnError>;

    /// Run a statement for its side effects and return the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns driver or parameter binding errors.
    fn execute_dml(&self, call: &PreparedCall) -> Result<usize, QueryFnError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn supports_named_placeholders(&self) -> bool {
        (**self).supports_named_placeholders()
    }

    fn query_rows(&self, call: &PreparedCall, on_row: &mut RowHandler<'_>) -> Result<(), QueryFnError> {
        (**self).query_rows(call, on_row)
    }

    fn execute_dml(&self, call: &PreparedCall) -> Result<usize, QueryFnError> {
        (**self).execute_dml(call)
    }
}

/// Statement execution for connections that run the driver off the async runtime.
#[async_trait]
pub trait AsyncExecutor: Send + Sync {
    fn supports_named_placeholders(&self) -> bool;

    /// Run a row-returning statement and materialize every row.
    ///
    /// # Errors
    ///
    /// Returns driver or parameter binding errors.
    async fn select(&self, call: PreparedCall) -> Result<ResultSet, QueryFnError>;

    /// Run a row-returning statement and keep only its first row.
    ///
    /// The default materializes through [`AsyncExecutor::select`]; connections that can stop
    /// reading early should override it.
    ///
    /// # Errors
    ///
    /// Returns driver or parameter binding errors.
    async fn select_first(&self, call: PreparedCall) -> Result<Option<DbRow>, QueryFnError> {
        Ok(self.select(call).await?.into_iter().next())
    }

    /// Run a statement and return the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns driver or parameter binding errors.
    async fn execute_dml(&self, call: PreparedCall) -> Result<usize, QueryFnError>;
}
