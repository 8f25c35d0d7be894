use std::marker::PhantomData;

use tokio::sync::mpsc;

use super::{STREAM_BUFFER, count, first_column};
use crate::context::DbScope;
use crate::decode::FromValue;
use crate::error::QueryFnError;
use crate::executor::{AsyncExecutor, Executor, RowFlow};
use crate::observer::CallTimer;
use crate::query_fn::QueryFn;
use crate::signature::CallArgs;
use crate::sqlite::SqliteConnection;

/// First column of the first row. No rows and SQL NULL both give `None`.
pub struct ScalarOrNone<T> {
    func: QueryFn,
    _value: PhantomData<fn() -> T>,
}

impl<T: FromValue> ScalarOrNone<T> {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self {
            func,
            _value: PhantomData,
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
        timer.finish(result, |value| u64::from(value.is_some()))
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`ScalarOrNone::call`].
    pub fn call_in<E: Executor + ?Sized>(&self, scope: &DbScope<'_, E>, args: CallArgs) -> Result<Option<T>, QueryFnError> {
        self.call(scope.conn()?, args)
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
    pub async fn call_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<Option<T>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self.run_async(conn, &args).await;
        timer.finish(result, |value| u64::from(value.is_some()))
    }

    fn run<E: Executor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Option<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(None);
        };
        let mut first = None;
        conn.query_rows(&call, &mut |row| {
            first = first_column::<Option<T>>(row)?;
            Ok(RowFlow::Stop)
        })?;
        Ok(first)
    }

    async fn run_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Option<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(None);
        };
        match conn.select_first(call).await? {
            Some(row) => first_column::<Option<T>>(row),
            None => Ok(None),
        }
    }
}

/// First column of every row.
///
/// Use `Option<T>` as the value type when the column can be NULL.
pub struct FetchScalars<T> {
    func: QueryFn,
    _value: PhantomData<fn() -> T>,
}

impl<T: FromValue> FetchScalars<T> {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self {
            func,
            _value: PhantomData,
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
        timer.finish(result, |values| count(values))
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`FetchScalars::call`].
    pub fn call_in<E: Executor + ?Sized>(&self, scope: &DbScope<'_, E>, args: CallArgs) -> Result<Vec<T>, QueryFnError> {
        self.call(scope.conn()?, args)
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
    pub async fn call_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<Vec<T>, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self.run_async(conn, &args).await;
        timer.finish(result, |values| count(values))
    }

    fn run<E: Executor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Vec<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(Vec::new());
        };
        let mut values = Vec::new();
        conn.query_rows(&call, &mut |row| {
            values.push(first_column(row)?);
            Ok(RowFlow::Continue)
        })?;
        Ok(values)
    }

    async fn run_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: &CallArgs) -> Result<Vec<T>, QueryFnError> {
        let Some(call) = self.func.prepare(args, conn.supports_named_placeholders())? else {
            return Ok(Vec::new());
        };
        conn.select(call).await?.into_iter().map(first_column).collect()
    }
}

/// First-column values handed over one at a time while the statement is still being read.
pub struct IterateScalars<T> {
    func: QueryFn,
    _value: PhantomData<fn() -> T>,
}

impl<T: FromValue> IterateScalars<T> {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self {
            func,
            _value: PhantomData,
        }
    }

    #[must_use]
    pub fn query_fn(&self) -> &QueryFn {
        &self.func
    }

    /// Feed each value to `f` until the rows run out or `f` returns [`RowFlow::Stop`].
    /// Returns the number of values delivered.
    ///
    /// # Errors
    ///
    /// Returns resolution, encoding, driver, or decode errors.
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
            conn.query_rows(&call, &mut |row| {
                let value = first_column(row)?;
                delivered += 1;
                Ok(f(value))
            })
        });
        timer.finish(result.map(|()| delivered), |n| *n)
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`IterateScalars::for_each`].
    pub fn for_each_in<E, F>(&self, scope: &DbScope<'_, E>, args: CallArgs, f: F) -> Result<u64, QueryFnError>
    where
        E: Executor + ?Sized,
        F: FnMut(T) -> RowFlow,
    {
        self.for_each(scope.conn()?, args, f)
    }
}

impl<T: FromValue + Send + 'static> IterateScalars<T> {
    /// Stream first-column values from an async connection through a bounded channel.
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
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut delivered = 0;
            let mut failure = None;
            while let Some(item) = rows.recv().await {
                let value = item.and_then(first_column::<T>);
                match &value {
                    Ok(_) => delivered += 1,
                    Err(err) => failure = Some(err.kind()),
                }
                if tx.send(value).await.is_err() || failure.is_some() {
                    break;
                }
            }
            timer.report(delivered, failure);
        });
        Ok(rx)
    }
}
