use crate::context::DbScope;
use crate::error::QueryFnError;
use crate::executor::{AsyncExecutor, Executor};
use crate::observer::CallTimer;
use crate::query_fn::QueryFn;
use crate::signature::CallArgs;

/// Run a statement for its side effects and return the number of rows changed.
///
/// Nothing is committed; run it inside a transaction the caller owns when needed.
pub struct Execute {
    func: QueryFn,
}

impl Execute {
    #[must_use]
    pub fn new(func: QueryFn) -> Self {
        Self { func }
    }

    #[must_use]
    pub fn query_fn(&self) -> &QueryFn {
        &self.func
    }

    /// Returns 0 without touching `conn` when the query function cancels.
    ///
    /// # Errors
    ///
    /// Returns resolution, encoding, or driver errors.
    pub fn call<E: Executor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<usize, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = self
            .func
            .prepare(&args, conn.supports_named_placeholders())
            .and_then(|call| match call {
                Some(call) => conn.execute_dml(&call),
                None => Ok(0),
            });
        timer.finish(result, |changed| *changed as u64)
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if the scope is empty, otherwise as [`Execute::call`].
    pub fn call_in<E: Executor + ?Sized>(&self, scope: &DbScope<'_, E>, args: CallArgs) -> Result<usize, QueryFnError> {
        self.call(scope.conn()?, args)
    }

    /// # Errors
    ///
    /// Returns resolution, encoding, or driver errors.
    pub async fn call_async<E: AsyncExecutor + ?Sized>(&self, conn: &E, args: CallArgs) -> Result<usize, QueryFnError> {
        let timer = CallTimer::start(self.func.name(), self.func.observer_ref());
        let result = match self.func.prepare(&args, conn.supports_named_placeholders()) {
            Ok(Some(call)) => conn.execute_dml(call).await,
            Ok(None) => Ok(0),
            Err(err) => Err(err),
        };
        timer.finish(result, |changed| *changed as u64)
    }
}
