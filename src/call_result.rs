//! The value a query function returns to steer statement and parameter resolution.
//!
//! ```rust
//! use query_fn::prelude::*;
//!
//! // `?` placeholders, statement from the mode's default
//! let by_id = query_fn::params([RowValues::Int(7)]);
//!
//! // named placeholders with a statement override
//! let search = query_fn::query_and_named(
//!     "select rowid from users where username like :search",
//!     [("search", RowValues::from("%jo%"))],
//! );
//! # let _ = (by_id, search);
//! ```

use crate::error::QueryFnError;
use crate::types::RowValues;

/// Outcome of a query function call.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CallResult {
    /// Default statement, no parameters.
    #[default]
    Empty,
    /// Statement and/or parameter overrides; absent parts fall back independently.
    Prepared(Prepared),
    /// Forward the function's own bound arguments as `?` parameters.
    AutoPositional,
    /// Forward the function's own bound arguments as `:name` parameters.
    AutoNamed,
}

impl From<()> for CallResult {
    fn from((): ()) -> Self {
        CallResult::Empty
    }
}

impl From<Prepared> for CallResult {
    fn from(prepared: Prepared) -> Self {
        CallResult::Prepared(prepared)
    }
}

/// Parameter container handed to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<RowValues>),
    /// Ordered name to value mapping.
    Named(Vec<(String, RowValues)>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, Params::Named(_))
    }
}

/// Explicit statement and parameter overrides.
///
/// Positional and keyword values may both be collected while building, but
/// [`Prepared::bake`] rejects the combination.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prepared {
    sql: Option<String>,
    args: Vec<RowValues>,
    kwargs: Vec<(String, RowValues)>,
}

impl Prepared {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Replace the statement override; `None` falls back to the mode's default.
    #[must_use]
    pub fn sql(mut self, sql: Option<String>) -> Self {
        self.sql = sql;
        self
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<RowValues>) -> Self {
        self.args.push(value.into());
        self
    }

    #[must_use]
    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.kwargs.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn kwargs<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        self.kwargs
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Split into the statement override and the parameter container.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::ValueError` if both positional and keyword values were supplied.
    pub fn bake(self) -> Result<(Option<String>, Option<Params>), QueryFnError> {
        let params = match (self.args.is_empty(), self.kwargs.is_empty()) {
            (false, false) => {
                return Err(QueryFnError::ValueError(
                    "only positional OR keyword parameters are allowed, not both".into(),
                ));
            }
            (true, false) => Some(Params::Named(self.kwargs)),
            (false, true) => Some(Params::Positional(self.args)),
            (true, true) => None,
        };
        Ok((self.sql, params))
    }
}

/// Positional parameters for the mode's default statement.
pub fn params<I, V>(values: I) -> CallResult
where
    I: IntoIterator<Item = V>,
    V: Into<RowValues>,
{
    Prepared::new().args(values).into()
}

/// Named parameters for the mode's default statement.
pub fn named<I, K, V>(values: I) -> CallResult
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RowValues>,
{
    Prepared::new().kwargs(values).into()
}

/// Statement override without parameters.
pub fn query_only(sql: impl Into<String>) -> CallResult {
    Prepared::new().with_sql(sql).into()
}

/// Statement override with positional parameters.
pub fn query_and_params<I, V>(sql: impl Into<String>, values: I) -> CallResult
where
    I: IntoIterator<Item = V>,
    V: Into<RowValues>,
{
    Prepared::new().with_sql(sql).args(values).into()
}

/// Statement override with named parameters.
pub fn query_and_named<I, K, V>(sql: impl Into<String>, values: I) -> CallResult
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RowValues>,
{
    Prepared::new().with_sql(sql).kwargs(values).into()
}

/// Skip execution; the mode returns its empty value.
///
/// # Errors
///
/// Always returns `QueryFnError::Cancelled`.
pub fn cancel<T>() -> Result<T, QueryFnError> {
    Err(QueryFnError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bake_rejects_mixed_parameters() {
        let prepared = Prepared::new().arg(1).kwarg("id", 1);
        assert!(matches!(prepared.bake(), Err(QueryFnError::ValueError(_))));
    }

    #[test]
    fn bake_keeps_absent_parts_absent() {
        let (sql, params) = Prepared::new().bake().unwrap();
        assert!(sql.is_none());
        assert!(params.is_none());

        let (sql, params) = Prepared::new().with_sql("select 1").kwarg("a", 2).bake().unwrap();
        assert_eq!(sql.as_deref(), Some("select 1"));
        assert_eq!(
            params,
            Some(Params::Named(vec![("a".into(), RowValues::Int(2))]))
        );
    }

    #[test]
    fn helpers_build_prepared_results() {
        let CallResult::Prepared(prepared) = query_and_params("select ?", [5]) else {
            panic!("expected prepared result");
        };
        let (sql, params) = prepared.bake().unwrap();
        assert_eq!(sql.as_deref(), Some("select ?"));
        assert_eq!(params, Some(Params::Positional(vec![RowValues::Int(5)])));
        assert_eq!(CallResult::from(()), CallResult::Empty);
    }
}
