use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use super::config::SharedSqliteConnection;
use super::params::PreparedCall;
use super::query::{build_result_set, execute_bound, for_each_row};
use crate::error::QueryFnError;
use crate::executor::{AsyncExecutor, RowFlow};
use crate::results::{DbRow, ResultSet};

/// `SQLite` connection for async callers.
///
/// Every statement runs on tokio's blocking pool while holding the connection lock,
/// so one connection executes one statement at a time.
#[derive(Clone)]
pub struct SqliteConnection {
    conn: SharedSqliteConnection,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&self.conn)
    }

    /// Run a closure against the underlying connection on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns whatever `func` returns, or `QueryFnError::ExecutionError` if the blocking task panics.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, QueryFnError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, QueryFnError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.conn_handle(), func).await
    }

    /// Stream raw rows through a bounded channel as the driver reads them.
    ///
    /// Reading stops early once the receiver is dropped. A failure is delivered as the
    /// last item.
    #[must_use]
    pub fn stream_rows(&self, call: PreparedCall, buffer: usize) -> mpsc::Receiver<Result<DbRow, QueryFnError>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let conn = self.conn_handle();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            let outcome = guard
                .prepare(&call.sql)
                .map_err(QueryFnError::from)
                .and_then(|mut stmt| {
                    for_each_row(&mut stmt, &call.params, &mut |row| {
                        Ok(if tx.blocking_send(Ok(row)).is_ok() {
                            RowFlow::Continue
                        } else {
                            RowFlow::Stop
                        })
                    })
                });
            if let Err(err) = outcome {
                warn!(sql = %call.sql, error = %err, "streamed query failed");
                let _ = tx.blocking_send(Err(err));
            }
        });
        rx
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, QueryFnError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, QueryFnError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| QueryFnError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

#[async_trait]
impl AsyncExecutor for SqliteConnection {
    fn supports_named_placeholders(&self) -> bool {
        true
    }

    async fn select(&self, call: PreparedCall) -> Result<ResultSet, QueryFnError> {
        run_blocking(self.conn_handle(), move |conn| {
            let mut stmt = conn.prepare(&call.sql)?;
            build_result_set(&mut stmt, &call.params)
        })
        .await
    }

    async fn select_first(&self, call: PreparedCall) -> Result<Option<DbRow>, QueryFnError> {
        run_blocking(self.conn_handle(), move |conn| {
            let mut stmt = conn.prepare(&call.sql)?;
            let mut first = None;
            for_each_row(&mut stmt, &call.params, &mut |row| {
                first = Some(row);
                Ok(RowFlow::Stop)
            })?;
            Ok(first)
        })
        .await
    }

    async fn execute_dml(&self, call: PreparedCall) -> Result<usize, QueryFnError> {
        run_blocking(self.conn_handle(), move |conn| {
            let mut stmt = conn.prepare(&call.sql)?;
            execute_bound(&mut stmt, &call.params)
        })
        .await
    }
}
