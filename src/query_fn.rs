//! A query function: a named body that decides the statement and parameters for a call.

use std::fmt;
use std::sync::Arc;

use crate::call_result::CallResult;
use crate::error::QueryFnError;
use crate::observer::{CallObserver, StatsRegistry};
use crate::resolver::resolve_statement;
use crate::signature::{BoundArgs, CallArgs, Signature};
use crate::sqlite::PreparedCall;
use crate::types::RowValues;

/// Body of a query function.
pub type QueryBody = dyn Fn(&BoundArgs) -> Result<CallResult, QueryFnError> + Send + Sync;

/// Named query function with an optional default statement.
///
/// ```rust
/// use query_fn::prelude::*;
///
/// let by_name = QueryFn::new("get_user_by_name", |args| {
///     Ok(query_fn::named([("name", args.value::<String>("name")?)]))
/// })
/// .sql("select * from users where username = :name")
/// .param("name");
/// # let _ = by_name;
/// ```
#[derive(Clone)]
pub struct QueryFn {
    name: String,
    sql: Option<String>,
    signature: Signature,
    body: Arc<QueryBody>,
    observer: Option<Arc<dyn CallObserver>>,
}

impl QueryFn {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&BoundArgs) -> Result<CallResult, QueryFnError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            sql: None,
            signature: Signature::new(),
            body: Arc::new(body),
            observer: None,
        }
    }

    /// Function whose body always runs the default statement without parameters.
    pub fn without_body(name: impl Into<String>) -> Self {
        Self::new(name, |_| Ok(CallResult::Empty))
    }

    /// Default statement used when the body does not supply one.
    #[must_use]
    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Declare a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.signature = self.signature.param(name);
        self
    }

    /// Declare a parameter with a default value.
    #[must_use]
    pub fn param_default(mut self, name: impl Into<String>, default: impl Into<RowValues>) -> Self {
        self.signature = self.signature.param_default(name, default);
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register the name with `registry` and report every call to it.
    #[must_use]
    pub fn stats(self, registry: &Arc<StatsRegistry>) -> Self {
        registry.register(self.name.clone());
        let observer: Arc<dyn CallObserver> = registry.clone();
        self.observer(observer)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn default_sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    #[must_use]
    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn observer_ref(&self) -> Option<&Arc<dyn CallObserver>> {
        self.observer.as_ref()
    }

    /// Bind `args` and run only the body, without touching a database.
    ///
    /// # Errors
    ///
    /// Returns argument binding errors or whatever the body returns.
    pub fn unwrapped(&self, args: &CallArgs) -> Result<CallResult, QueryFnError> {
        let bound = self.signature.bind(args)?;
        (self.body)(&bound)
    }

    /// Bind, resolve, encode and expand. `Ok(None)` means the body cancelled the call.
    ///
    /// # Errors
    ///
    /// Returns binding, resolution, or encoding errors.
    pub fn prepare(&self, args: &CallArgs, named_supported: bool) -> Result<Option<PreparedCall>, QueryFnError> {
        let bound = self.signature.bind(args).map_err(|err| match err {
            QueryFnError::UsageError(msg) => QueryFnError::UsageError(format!("{}() {msg}", self.name)),
            other => other,
        })?;
        let resolved = resolve_statement(
            &self.name,
            |bound| (self.body)(bound),
            &bound,
            self.sql.as_deref(),
            named_supported,
        )?;
        resolved.map(PreparedCall::from_resolved).transpose()
    }
}

impl fmt::Debug for QueryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFn")
            .field("name", &self.name)
            .field("sql", &self.sql)
            .field("signature", &self.signature)
            .field("observed", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}
