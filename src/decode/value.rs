use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use super::{FieldType, make_scalar_decoder};
use crate::error::QueryFnError;
use crate::types::RowValues;

/// Rust types a raw column value converts into.
///
/// `FIELD_TYPE` is the declared type used to pick the scalar decoder, so
/// `NaiveDate` fields accept ISO text and `bool` fields accept `0`/`1`.
/// A SQL NULL is an error unless the target is `Option<T>` or [`RowValues`].
pub trait FromValue: Sized {
    const FIELD_TYPE: FieldType;

    /// # Errors
    ///
    /// Returns `QueryFnError::DecodeError` when the value does not convert.
    fn from_value(value: RowValues) -> Result<Self, QueryFnError>;
}

fn unexpected(target: &str, value: &RowValues) -> QueryFnError {
    if value.is_null() {
        QueryFnError::DecodeError(format!("unexpected NULL for non-optional {target}"))
    } else {
        QueryFnError::DecodeError(format!(
            "expected {target}, found {} value {value:?}",
            value.type_name()
        ))
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $field:expr, $target:literal, $variant:ident) => {
        impl FromValue for $ty {
            const FIELD_TYPE: FieldType = $field;

            fn from_value(value: RowValues) -> Result<Self, QueryFnError> {
                match make_scalar_decoder(Self::FIELD_TYPE)(value)? {
                    RowValues::$variant(v) => Ok(v),
                    other => Err(unexpected($target, &other)),
                }
            }
        }
    };
}

impl_from_value!(i64, FieldType::Int, "integer", Int);
impl_from_value!(f64, FieldType::Float, "float", Float);
impl_from_value!(String, FieldType::Text, "text", Text);
impl_from_value!(bool, FieldType::Bool, "boolean", Bool);
impl_from_value!(Decimal, FieldType::Decimal, "decimal", Decimal);
impl_from_value!(NaiveDate, FieldType::Date, "date", Date);
impl_from_value!(NaiveDateTime, FieldType::DateTime, "timestamp", Timestamp);
impl_from_value!(DateTime<FixedOffset>, FieldType::DateTimeTz, "timestamp with offset", TimestampTz);
impl_from_value!(Vec<u8>, FieldType::Blob, "blob", Blob);
impl_from_value!(JsonValue, FieldType::Json, "json", JSON);

macro_rules! impl_from_value_narrow {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            const FIELD_TYPE: FieldType = FieldType::Int;

            fn from_value(value: RowValues) -> Result<Self, QueryFnError> {
                let wide = i64::from_value(value)?;
                <$ty>::try_from(wide).map_err(|_| {
                    QueryFnError::DecodeError(format!(
                        "integer {wide} out of range for {}",
                        stringify!($ty)
                    ))
                })
            }
        }
    )*};
}

impl_from_value_narrow!(i32, u32, usize);

impl FromValue for DateTime<Utc> {
    const FIELD_TYPE: FieldType = FieldType::DateTimeTz;

    fn from_value(value: RowValues) -> Result<Self, QueryFnError> {
        DateTime::<FixedOffset>::from_value(value).map(|ts| ts.with_timezone(&Utc))
    }
}

impl FromValue for RowValues {
    const FIELD_TYPE: FieldType = FieldType::Any;

    fn from_value(value: RowValues) -> Result<Self, QueryFnError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;

    fn from_value(value: RowValues) -> Result<Self, QueryFnError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
