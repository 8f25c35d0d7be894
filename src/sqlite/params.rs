use std::fmt;

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value};
use tracing::debug;

use crate::call_result::Params;
use crate::error::QueryFnError;
use crate::expansion::{Slot, expand_named, expand_positional};
use crate::resolver::ResolvedStatement;
use crate::types::{CustomValue, RowValues};

/// A parameter value in a form `SQLite` accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Value(Value),
    /// Converts itself through its own `ToSql` impl.
    Custom(CustomValue),
}

impl ToSql for BoundValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            BoundValue::Value(value) => value.to_sql(),
            BoundValue::Custom(custom) => custom.0.to_sql(),
        }
    }
}

impl From<Value> for BoundValue {
    fn from(value: Value) -> Self {
        BoundValue::Value(value)
    }
}

/// Position or name of a parameter, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Index(idx) => write!(f, "#{idx}"),
            ParamKey::Name(name) => write!(f, "`{name}`"),
        }
    }
}

/// Convert one scalar value. Returns the failure reason for values with no scalar form.
///
/// # Errors
///
/// Returns a reason string for lists and mappings.
pub fn encode_value(value: &RowValues) -> Result<BoundValue, String> {
    let encoded = match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        RowValues::Timestamp(ts) => Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        RowValues::TimestampTz(ts) => {
            Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
        }
        RowValues::Decimal(d) => Value::Text(d.to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(json) => Value::Text(json.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
        RowValues::Custom(custom) => return Ok(BoundValue::Custom(custom.clone())),
        RowValues::List(_) => return Err("nested sequences cannot be bound".into()),
        RowValues::Map(_) => return Err("mapping values cannot be bound".into()),
    };
    Ok(BoundValue::Value(encoded))
}

/// Encode a parameter. Lists become an expansion slot with every element encoded.
///
/// # Errors
///
/// Returns `QueryFnError::EncodeError` naming the parameter (and element index for lists).
pub fn encode_param(key: &ParamKey, value: &RowValues) -> Result<Slot<BoundValue>, QueryFnError> {
    match value {
        RowValues::List(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                encode_value(item).map_err(|reason| QueryFnError::EncodeError {
                    param: format!("{key}[{idx}]"),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Slot::Expand),
        _ => encode_value(value)
            .map(Slot::Single)
            .map_err(|reason| QueryFnError::EncodeError {
                param: key.to_string(),
                reason,
            }),
    }
}

/// Encoded parameters in binding order.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundParams {
    Positional(Vec<BoundValue>),
    Named(Vec<(String, BoundValue)>),
}

impl BoundParams {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            BoundParams::Positional(values) => values.len(),
            BoundParams::Named(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Statement ready for the driver: placeholders expanded, values encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub sql: String,
    pub params: BoundParams,
}

impl PreparedCall {
    #[must_use]
    pub fn new(sql: impl Into<String>, params: BoundParams) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Encode the parameters of a resolved statement and expand list placeholders.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::EncodeError` for values with no `SQLite` form, or
    /// `QueryFnError::UsageError` when list parameters meet numbered placeholders.
    pub fn from_resolved(resolved: ResolvedStatement) -> Result<Self, QueryFnError> {
        let ResolvedStatement { sql, params } = resolved;
        let call = match params {
            Params::Positional(values) => {
                let slots = values
                    .iter()
                    .enumerate()
                    .map(|(idx, value)| encode_param(&ParamKey::Index(idx), value))
                    .collect::<Result<Vec<_>, _>>()?;
                let (expanded, values) = expand_positional(&sql, slots)?;
                PreparedCall::new(expanded, BoundParams::Positional(values))
            }
            Params::Named(values) => {
                let slots = values
                    .into_iter()
                    .map(|(name, value)| {
                        let slot = encode_param(&ParamKey::Name(name.clone()), &value)?;
                        Ok((name, slot))
                    })
                    .collect::<Result<Vec<_>, QueryFnError>>()?;
                let (expanded, values) = expand_named(&sql, slots)?;
                PreparedCall::new(expanded, BoundParams::Named(values))
            }
        };
        debug!(sql = %call.sql, params = call.params.len(), "prepared statement");
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn text(s: &str) -> BoundValue {
        BoundValue::Value(Value::Text(s.into()))
    }

    #[test]
    fn scalars_encode_to_sqlite_forms() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let ts = date.and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(encode_value(&RowValues::Bool(true)).unwrap(), BoundValue::Value(Value::Integer(1)));
        assert_eq!(encode_value(&RowValues::Date(date)).unwrap(), text("2024-01-02"));
        assert_eq!(encode_value(&RowValues::Timestamp(ts)).unwrap(), text("2024-01-02 03:04:05"));
        assert_eq!(
            encode_value(&RowValues::TimestampTz(ts.and_utc().fixed_offset())).unwrap(),
            text("2024-01-02 03:04:05+00:00")
        );
        assert_eq!(
            encode_value(&RowValues::Decimal(Decimal::new(123_456, 2))).unwrap(),
            text("1234.56")
        );
        assert_eq!(
            encode_value(&RowValues::JSON(serde_json::json!({"a": 1}))).unwrap(),
            text("{\"a\":1}")
        );
    }

    #[test]
    fn lists_expand_and_maps_fail() {
        let slot = encode_param(&ParamKey::Name("ids".into()), &RowValues::from(vec![1, 2])).unwrap();
        assert_eq!(
            slot,
            Slot::Expand(vec![
                BoundValue::Value(Value::Integer(1)),
                BoundValue::Value(Value::Integer(2)),
            ])
        );

        let err = encode_param(&ParamKey::Index(0), &RowValues::Map(BTreeMap::new())).unwrap_err();
        assert!(matches!(err, QueryFnError::EncodeError { ref param, .. } if param == "#0"));
    }

    #[test]
    fn bad_list_element_names_index() {
        let value = RowValues::List(vec![RowValues::Int(1), RowValues::List(vec![])]);
        let err = encode_param(&ParamKey::Name("ids".into()), &value).unwrap_err();
        assert_eq!(err.to_string(), "Cannot bind parameter `ids`[1]: nested sequences cannot be bound");
    }

    #[test]
    fn from_resolved_expands_lists() {
        let resolved = ResolvedStatement {
            sql: "select * from users where rowid in (:ids) and username = :name".into(),
            params: Params::Named(vec![
                ("ids".into(), RowValues::from(vec![1, 2, 100])),
                ("name".into(), RowValues::from("jane")),
            ]),
        };
        let call = PreparedCall::from_resolved(resolved).unwrap();
        assert_eq!(
            call.sql,
            "select * from users where rowid in (:__ids_0, :__ids_1, :__ids_2) and username = :name"
        );
        assert_eq!(call.params.len(), 4);
    }
}
