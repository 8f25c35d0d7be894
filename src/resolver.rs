use tracing::debug;

use crate::call_result::{CallResult, Params};
use crate::error::QueryFnError;
use crate::signature::BoundArgs;

/// Final statement text and parameter container, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStatement {
    pub sql: String,
    pub params: Params,
}

/// Run a query function body and turn its [`CallResult`] into a statement.
///
/// Returns `Ok(None)` when the body cancels execution.
///
/// # Errors
///
/// * `QueryFnError::ValueError` if a prepared result carries positional and keyword values.
/// * `QueryFnError::UsageError` if `AutoNamed` is requested and `named_supported` is false.
/// * `QueryFnError::ConfigError` if no statement text is available.
/// * Any error returned by the body other than `Cancelled`.
pub fn resolve_statement<F>(
    func_name: &str,
    body: F,
    args: &BoundArgs,
    default_sql: Option<&str>,
    named_supported: bool,
) -> Result<Option<ResolvedStatement>, QueryFnError>
where
    F: FnOnce(&BoundArgs) -> Result<CallResult, QueryFnError>,
{
    let outcome = match body(args) {
        Ok(outcome) => outcome,
        Err(QueryFnError::Cancelled) => {
            debug!(function = func_name, "query function cancelled execution");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let (sql, params) = match outcome {
        CallResult::Empty => (default_sql.map(str::to_owned), Params::default()),
        CallResult::Prepared(prepared) => {
            let (sql, params) = prepared.bake()?;
            (
                sql.or_else(|| default_sql.map(str::to_owned)),
                params.unwrap_or_default(),
            )
        }
        CallResult::AutoPositional => (
            default_sql.map(str::to_owned),
            Params::Positional(args.to_positional()),
        ),
        CallResult::AutoNamed => {
            if !named_supported {
                return Err(QueryFnError::UsageError(format!(
                    "`{func_name}` requested named parameters, but this executor only \
                     accepts positional placeholders"
                )));
            }
            (
                default_sql.map(str::to_owned),
                Params::Named(args.to_named()),
            )
        }
    };

    let Some(sql) = sql else {
        return Err(QueryFnError::ConfigError(format!(
            "no SQL statement for `{func_name}`: it must come from either the mode's \
             default statement or the function's return value"
        )));
    };

    debug!(function = func_name, sql = %sql, params = params.len(), "resolved statement");
    Ok(Some(ResolvedStatement { sql, params }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_result::{Prepared, cancel, query_only};
    use crate::signature::{CallArgs, Signature};
    use crate::types::RowValues;

    fn bound() -> BoundArgs {
        Signature::new()
            .param("id")
            .param_default("limit", 10)
            .bind(&CallArgs::new().arg(3))
            .unwrap()
    }

    #[test]
    fn empty_uses_default_statement() {
        let res = resolve_statement("f", |_| Ok(CallResult::Empty), &bound(), Some("select 1"), true)
            .unwrap()
            .unwrap();
        assert_eq!(res.sql, "select 1");
        assert!(res.params.is_empty());
    }

    #[test]
    fn prepared_parts_fall_back_independently() {
        let res = resolve_statement(
            "f",
            |_| Ok(Prepared::new().arg(1).into()),
            &bound(),
            Some("select ?"),
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(res.sql, "select ?");
        assert_eq!(res.params, Params::Positional(vec![RowValues::Int(1)]));

        let res = resolve_statement("f", |_| Ok(query_only("select 2")), &bound(), None, true)
            .unwrap()
            .unwrap();
        assert_eq!(res.sql, "select 2");
        assert_eq!(res.params, Params::Positional(vec![]));
    }

    #[test]
    fn auto_forwards_bound_arguments() {
        let res = resolve_statement("f", |_| Ok(CallResult::AutoPositional), &bound(), Some("q"), true)
            .unwrap()
            .unwrap();
        assert_eq!(
            res.params,
            Params::Positional(vec![RowValues::Int(3), RowValues::Int(10)])
        );

        let res = resolve_statement("f", |_| Ok(CallResult::AutoNamed), &bound(), Some("q"), true)
            .unwrap()
            .unwrap();
        assert_eq!(
            res.params,
            Params::Named(vec![
                ("id".into(), RowValues::Int(3)),
                ("limit".into(), RowValues::Int(10)),
            ])
        );
    }

    #[test]
    fn auto_named_needs_named_placeholders() {
        let err = resolve_statement("f", |_| Ok(CallResult::AutoNamed), &bound(), Some("q"), false)
            .unwrap_err();
        assert!(matches!(err, QueryFnError::UsageError(_)));
    }

    #[test]
    fn missing_statement_names_function() {
        let err = resolve_statement("get_users", |_| Ok(CallResult::Empty), &bound(), None, true)
            .unwrap_err();
        match err {
            QueryFnError::ConfigError(msg) => assert!(msg.contains("get_users")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancel_skips_and_mixed_params_fail() {
        let res = resolve_statement("f", |_| cancel(), &bound(), Some("q"), true).unwrap();
        assert!(res.is_none());

        let err = resolve_statement(
            "f",
            |_| Ok(Prepared::new().arg(1).kwarg("id", 1).into()),
            &bound(),
            Some("q"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, QueryFnError::ValueError(_)));
    }
}
