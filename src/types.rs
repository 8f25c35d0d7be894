use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

/// Values that can be used as query parameters or read back from a result row.
///
/// Parameters and raw column values share the same enum, so a query function can
/// forward its own arguments without conversion:
/// ```rust
/// use query_fn::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::from(vec![1, 2, 100]),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
    /// Timestamp without offset
    Timestamp(NaiveDateTime),
    /// Timestamp with a fixed UTC offset
    TimestampTz(DateTime<FixedOffset>),
    /// Fixed-point decimal
    Decimal(Decimal),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// Sequence or set; expands into one placeholder per element when bound.
    List(Vec<RowValues>),
    /// Mapping; never bindable as a single parameter.
    Map(BTreeMap<String, RowValues>),
    /// Value carrying its own driver conversion.
    Custom(CustomValue),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[RowValues]> {
        if let RowValues::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// Variant name used in conversion error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "integer",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "boolean",
            RowValues::Date(_) => "date",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::TimestampTz(_) => "timestamp with offset",
            RowValues::Decimal(_) => "decimal",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
            RowValues::List(_) => "list",
            RowValues::Map(_) => "map",
            RowValues::Custom(_) => "custom",
        }
    }
}

/// Shared handle to a value that converts itself for `SQLite`.
///
/// Equality is identity: two handles are equal only if they point at the same value.
#[derive(Clone)]
pub struct CustomValue(pub Arc<dyn rusqlite::ToSql + Send + Sync>);

impl CustomValue {
    pub fn new<T>(value: T) -> Self
    where
        T: rusqlite::ToSql + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValue(..)")
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {$(
        impl From<$ty> for RowValues {
            fn from(value: $ty) -> Self {
                RowValues::Int(i64::from(value))
            }
        }
    )*};
}

impl_from_int!(i8, i16, i32, i64, u16, u32);

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<f32> for RowValues {
    fn from(value: f32) -> Self {
        RowValues::Float(f64::from(value))
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&[u8]> for RowValues {
    fn from(value: &[u8]) -> Self {
        RowValues::Blob(value.to_vec())
    }
}

impl From<NaiveDate> for RowValues {
    fn from(value: NaiveDate) -> Self {
        RowValues::Date(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<DateTime<FixedOffset>> for RowValues {
    fn from(value: DateTime<FixedOffset>) -> Self {
        RowValues::TimestampTz(value)
    }
}

impl From<DateTime<Utc>> for RowValues {
    fn from(value: DateTime<Utc>) -> Self {
        RowValues::TimestampTz(value.fixed_offset())
    }
}

impl From<Decimal> for RowValues {
    fn from(value: Decimal) -> Self {
        RowValues::Decimal(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl From<CustomValue> for RowValues {
    fn from(value: CustomValue) -> Self {
        RowValues::Custom(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

impl<T: Into<RowValues>> From<Vec<T>> for RowValues {
    fn from(values: Vec<T>) -> Self {
        RowValues::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>, const N: usize> From<[T; N]> for RowValues {
    fn from(values: [T; N]) -> Self {
        RowValues::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>> From<BTreeSet<T>> for RowValues {
    fn from(values: BTreeSet<T>) -> Self {
        RowValues::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>, S> From<HashSet<T, S>> for RowValues {
    fn from(values: HashSet<T, S>) -> Self {
        RowValues::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>> From<BTreeMap<String, T>> for RowValues {
    fn from(values: BTreeMap<String, T>) -> Self {
        RowValues::Map(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<RowValues>, S> From<HashMap<String, T, S>> for RowValues {
    fn from(values: HashMap<String, T, S>) -> Self {
        RowValues::Map(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
