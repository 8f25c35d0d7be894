use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::debug;

use super::connection::{SqliteConnection, run_blocking};
use crate::error::QueryFnError;

/// Options for opening a `SQLite` connection.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Option<Duration>,
    pub foreign_keys: bool,
    pub wal: bool,
    /// Extra `PRAGMA name = value` statements run after opening.
    pub pragmas: Vec<(String, String)>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: None,
            foreign_keys: false,
            wal: false,
            pragmas: Vec::new(),
        }
    }

    /// In-memory database private to the connection.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// Open a blocking connection and apply the options.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::SqliteError` if the database cannot be opened or a pragma fails.
    pub fn open(&self) -> Result<Connection, QueryFnError> {
        let conn = if self.db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&self.db_path)?
        };
        self.apply(&conn)?;
        debug!(db_path = %self.db_path, "opened sqlite connection");
        Ok(conn)
    }

    /// Open a connection for async use. Opening and pragmas run on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError` if the database cannot be opened or the blocking task fails.
    pub async fn connect(&self) -> Result<SqliteConnection, QueryFnError> {
        let opts = self.clone();
        let conn = tokio::task::spawn_blocking(move || opts.open())
            .await
            .map_err(|e| {
                QueryFnError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
            })??;
        Ok(SqliteConnection::new(conn))
    }

    fn apply(&self, conn: &Connection) -> Result<(), QueryFnError> {
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        if self.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        if self.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        for (name, value) in &self.pragmas {
            conn.execute_batch(&format!("PRAGMA {name} = {value};"))?;
        }
        Ok(())
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn wal(mut self, enabled: bool) -> Self {
        self.opts.wal = enabled;
        self
    }

    #[must_use]
    pub fn pragma(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.pragmas.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open a blocking connection.
    ///
    /// # Errors
    ///
    /// See [`SqliteOptions::open`].
    pub fn open(self) -> Result<Connection, QueryFnError> {
        self.opts.open()
    }

    /// Open an async connection.
    ///
    /// # Errors
    ///
    /// See [`SqliteOptions::connect`].
    pub async fn connect(self) -> Result<SqliteConnection, QueryFnError> {
        self.opts.connect().await
    }
}

impl SqliteConnection {
    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Run a batch of statements, such as schema setup.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::SqliteError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), QueryFnError> {
        let sql = sql.to_owned();
        run_blocking(self.conn_handle(), move |conn| {
            conn.execute_batch(&sql).map_err(QueryFnError::from)
        })
        .await
    }
}

pub(crate) type SharedSqliteConnection = Arc<Mutex<Connection>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_pragmas() {
        let conn = SqliteOptionsBuilder::new(":memory:")
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(250))
            .pragma("user_version", "7")
            .open()
            .unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!((fk, version), (1, 7));
    }

    #[test]
    fn file_database_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let opts = SqliteOptionsBuilder::new(path.to_string_lossy()).wal(true).finish();
        let conn = opts.open().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        assert!(path.exists());
    }
}
