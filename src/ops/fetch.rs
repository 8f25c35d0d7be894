use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{STREAM_BUFFER, count};
use crate::context::DbScope;
use crate::decode::{DecodeSession, RecordDecoder, ResultRecord};
use crate::error::QueryFnError;
use crate::executor::{AsyncExecutor, Executor, RowFlow};
use crate::observer::CallTimer;
use crate::query_fn::QueryFn;
use crate::signature::CallArgs;
use crate::sqlite::SqliteConnection;

/// Every row, decoded as `T`.
///
/// ```rust
/// use query_fn::prelude::*;
///
/// query_fn::result_record! {
///     pub struct User {
///         pub id: i64,
///         pub username: String,
///     }
/// }
///
/// # fn main() -> Result<(), QueryFnError> {
/// let conn = SqliteOptions::in_memory().open()?;
/// conn.execute_batch("CREATE TABLE users (id INTEGER, username TEXT);
///                     INSERT INTO users VALUES (1, 'jane'), (2, 'john');")?;
///
/// let get_users: FetchAll<User> = FetchAll::new(
///     QueryFn::without_body("get_users").sql("select id, username from users order by id"),
/// );
/// let users = get_users.call(&conn, CallArgs::new())?;
/// assert_eq!(users[1].username, "john");
/// # Ok(()) }
/// ```
pub struct FetchAll<T> {
    func: QueryFn,
    decoder: Arc<RecordDecoder>,
    _record: PhantomData<fn() -> T>,
}

impl<T: ResultRecord> FetchAll<T> {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self {
            func,
            decoder: RecordDecoder::for_record::<T>(),
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn query_fn(&self) -> &QueryFn {
        &self.func
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
    pub fn call<E: Executor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<Vec<T>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self.run(conn, &args);
        timer.finish(result, |records| count(records))
    }

    /// Call with the scope's default connection.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`FetchAll::call`].
    pub fn call_in<E: Executor + ?Sized>(&self, scope: &DbScope<'_, E>, args: CallArgs) -> Result<Vec<T>, QueryFnError> {
        self.call(scope.conn()?, args)
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
    pub async fn call_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<Vec<T>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self.run_async(conn, &args).await;
        timer.finish(result, |records| count(records))
    }

    fn run<E: Executor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Vec<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(Vec::new());
        };
        let mut session = DecodeSession::new(&self.decoder);
        let mut records = Vec::new();
        conn.query_rows(&call, &mut |row| {
            records.push(session.decode(row)?);
            Ok(RowFlow::Continue)
        })?;
        Ok(records)
    }

    async fn run_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Vec<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(Vec::new());
        };
        let result_set = conn.select(call).await?;
        let bound = self.decoder.bind(result_set.column_names())?;
        result_set.into_iter().map(|row| bound.decode(row)).collect()
    }
}

/// The first row decoded as `T`, or `None` when there are no rows.
pub struct OneOrNone<T> {
    func: QueryFn,
    decoder: Arc<RecordDecoder>,
    _record: PhantomData<fn() -> T>,
}

impl<T: ResultRecord> OneOrNone<T> {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self {
            func,
            decoder: RecordDecoder::for_record::<T>(),
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn query_fn(&self) -> &QueryFn {
        &self.func
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
    pub fn call<E: Executor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<Option<T>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self.run(conn, &args);
        timer.finish(result, |record| u64::from(record.is_some()))
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`OneOrNone::call`].
    pub fn call_in<E: Executor + ?Sized>(&self, scope: &DbScope<'_, E>, args: CallArgs) -> Result<Option<T>, QueryFnError> {
        self.call(scope.conn()?, args)
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
    pub async fn call_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<Option<T>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self.run_async(conn, &args).await;
        timer.finish(result, |record| u64::from(record.is_some()))
    }

    fn run<E: Executor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Option<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(None);
        };
        let mut session = DecodeSession::new(&self.decoder);
        let mut first = None;
        conn.query_rows(&call, &mut |row| {
            first = Some(session.decode(row)?);
            Ok(RowFlow::Stop)
        })?;
        Ok(first)
    }

    async fn run_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Option<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(None);
        };
        let Some(row) = conn.select_first(call).await? else {
            return Ok(None);
        };
        let bound = self.decoder.bind(row.column_names())?;
        bound.decode(row).map(Some)
    }
}

/// Records handed over one at a time while the statement is still being read.
pub struct Iterate<T> {
    func: QueryFn,
    decoder: Arc<RecordDecoder>,
    _record: PhantomData<fn() -> T>,
}

impl<T: ResultRecord> Iterate<T> {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self {
            func,
            decoder: RecordDecoder::for_record::<T>(),
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn query_fn(&self) -> &QueryFn {
        &self.func
    }

    /// Feed each record to `f` until the rows run out or `f` returns [`RowFlow::Stop`].
    /// Returns the number of records delivered.
    ///
    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors. Records delivered before
    /// the error stay delivered.
    pub fn for_each<E, F>(&self, conn: &E, args: CallArgs, mut f: F) -> Result<u64, QueryFnError>
    where
        E: Executor + ?Sized,
        F: FnMut(T) -> RowFlow,
    {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let mut delivered = 0;
        let result = self.func.prepare(&args, conn.supports_named_placeholders()).and_then(|call| {
            let Some(call) = call else {
                return Ok(());
            };
            let mut session = DecodeSession::new(&self.decoder);
            conn.query_rows(&call, &mut |row| {
                let record = session.decode(row)?;
                delivered += 1;
                Ok(f(record))
            })
        });
        timer.finish(result.map(|()| delivered), |n| *n)
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`Iterate::for_each`].
    pub fn for_each_in<E, F>(&self, scope: &DbScope<'_, E>, args: CallArgs, f: F) -> Result<u64, QueryFnError>
    where
        E: Executor + ?Sized,
        F: FnMut(T) -> RowFlow,
    {
        self.for_each(scope.conn()?, args, f)
    }
}

impl<T: ResultRecord + Send> Iterate<T> {
    /// Stream records from an async connection through a bounded channel.
    ///
    /// Rows are read and decoded as the receiver consumes them; dropping the receiver
    /// stops reading. A failure arrives as the last item. A cancelled call yields an
    /// already-closed receiver.
    ///
    /// # Errors
    ///
    /// Returns resolution or encoding errors raised before the statement starts.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn stream(
        &self,
        conn: &SqliteConnection,
        args: CallArgs,
    ) -> Result<mpsc::Receiver<Result<T, QueryFnError>>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let call = match self.func.prepare(&args, true) {
            Ok(Some(call)) => call,
            Ok(None) => {
                timer.report(0, None);
                let (_, rx) = mpsc::channel(1);
                return Ok(rx);
            }
            Err(err) => {
                timer.report(0, Some(err.kind()));
                return Err(err);
            }
        };

        let mut rows = conn.stream_rows(call, STREAM_BUFFER);
        let decoder = Arc::clone(&self.decoder);
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut session = DecodeSession::new(&decoder);
            let mut delivered = 0;
            let mut failure = None;
            while let Some(item) = rows.recv().await {
                let record = item.and_then(|row| session.decode::<T>(row));
                match &record {
                    Ok(_) => delivered += 1,
                    Err(err) => failure = Some(err.kind()),
                }
                if tx.send(record).await.is_err() || failure.is_some() {
                    break;
                }
            }
            timer.report(delivered, failure);
        });
        Ok(rx)
    }
}
