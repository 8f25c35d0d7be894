use tracing::trace;

use super::params::PreparedCall;
use super::query::{execute_bound, for_each_row};
use crate::error::QueryFnError;
use crate::executor::{Executor, RowHandler};

impl Executor for rusqlite::Connection {
    fn supports_named_placeholders(&self) -> bool {
        true
    }

    fn query_rows(&self, call: &PreparedCall, on_row: &mut RowHandler<'_>) -> Result<(), QueryFnError> {
        let mut stmt = self.prepare(&call.sql)?;
        let rows = for_each_row(&mut stmt, &call.params, on_row)?;
        trace!(sql = %call.sql, rows, "sqlite query finished");
        Ok(())
    }

    fn execute_dml(&self, call: &PreparedCall) -> Result<usize, QueryFnError> {
        let mut stmt = self.prepare(&call.sql)?;
        let changed = execute_bound(&mut stmt, &call.params)?;
        trace!(sql = %call.sql, changed, "sqlite execute finished");
        Ok(changed)
    }
}

impl Executor for rusqlite::Transaction<'_> {
    fn supports_named_placeholders(&self) -> bool {
        true
    }

    fn query_rows(&self, call: &PreparedCall, on_row: &mut RowHandler<'_>) -> Result<(), QueryFnError> {
        let conn: &rusqlite::Connection = self;
        conn.query_rows(call, on_row)
    }

    fn execute_dml(&self, call: &PreparedCall) -> Result<usize, QueryFnError> {
        let conn: &rusqlite::Connection = self;
        conn.execute_dml(call)
    }
}
