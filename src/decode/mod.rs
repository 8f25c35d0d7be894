//! Converting raw column values into declared result types.
//!
//! `SQLite` hands back integers, reals, text and blobs only. A [`FieldType`] names what a
//! result field is declared as, and [`make_scalar_decoder`] picks the conversion that turns
//! the raw value into that shape: ISO text becomes dates and timestamps, `0`/`1` become
//! booleans, canonical decimal text becomes [`Decimal`].

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::QueryFnError;
use crate::types::RowValues;

mod record;
mod value;

pub use record::{BoundDecoder, DecodeSession, DecodedRow, FieldSpec, RecordDecoder, RecordShape, ResultRecord};
pub use value::FromValue;

/// Declared type of a result field or scalar result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Accept the raw value unchanged.
    Any,
    Int,
    Float,
    Text,
    Bool,
    Decimal,
    Date,
    DateTime,
    DateTimeTz,
    Blob,
    Json,
}

/// Conversion from a raw column value to the canonical variant of a [`FieldType`].
pub type DecodeFn = fn(RowValues) -> Result<RowValues, QueryFnError>;

/// Select the decode function for a declared type. `Null` always decodes to `Null`.
#[must_use]
pub fn make_scalar_decoder(ty: FieldType) -> DecodeFn {
    match ty {
        FieldType::Any => as_is,
        FieldType::Int => decode_int,
        FieldType::Float => decode_float,
        FieldType::Text => decode_text,
        FieldType::Bool => decode_bool,
        FieldType::Decimal => decode_decimal,
        FieldType::Date => decode_date,
        FieldType::DateTime => decode_datetime,
        FieldType::DateTimeTz => decode_datetime_tz,
        FieldType::Blob => decode_blob,
        FieldType::Json => decode_json,
    }
}

#[allow(clippy::unnecessary_wraps)]
fn as_is(value: RowValues) -> Result<RowValues, QueryFnError> {
    Ok(value)
}

fn mismatch(target: &str, value: &RowValues) -> QueryFnError {
    QueryFnError::DecodeError(format!(
        "cannot convert {} value {value:?} to {target}",
        value.type_name()
    ))
}

fn decode_int(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Int(_) => return Ok(value),
        RowValues::Bool(b) => i64::from(*b),
        #[allow(clippy::cast_possible_truncation)]
        RowValues::Float(f) if f.is_finite() => f.trunc() as i64,
        RowValues::Decimal(d) => d.trunc().to_i64().ok_or_else(|| mismatch("integer", &value))?,
        RowValues::Text(s) => s.trim().parse().map_err(|_| mismatch("integer", &value))?,
        _ => return Err(mismatch("integer", &value)),
    };
    Ok(RowValues::Int(out))
}

fn decode_float(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Float(_) => return Ok(value),
        #[allow(clippy::cast_precision_loss)]
        RowValues::Int(i) => *i as f64,
        RowValues::Bool(b) => f64::from(u8::from(*b)),
        RowValues::Decimal(d) => d.to_f64().ok_or_else(|| mismatch("float", &value))?,
        RowValues::Text(s) => s.trim().parse().map_err(|_| mismatch("float", &value))?,
        _ => return Err(mismatch("float", &value)),
    };
    Ok(RowValues::Float(out))
}

fn decode_text(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Text(_) => return Ok(value),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => b.to_string(),
        RowValues::Decimal(d) => d.to_string(),
        RowValues::Date(d) => d.format("%Y-%m-%d").to_string(),
        RowValues::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        RowValues::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        RowValues::JSON(j) => j.to_string(),
        RowValues::Blob(b) => String::from_utf8(b.clone()).map_err(|_| mismatch("text", &value))?,
        _ => return Err(mismatch("text", &value)),
    };
    Ok(RowValues::Text(out))
}

fn decode_bool(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Bool(_) => return Ok(value),
        RowValues::Int(i) => *i != 0,
        RowValues::Float(f) => *f != 0.0,
        RowValues::Decimal(d) => !d.is_zero(),
        RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" => true,
            "0" | "false" | "f" | "no" => false,
            _ => return Err(mismatch("boolean", &value)),
        },
        _ => return Err(mismatch("boolean", &value)),
    };
    Ok(RowValues::Bool(out))
}

fn decode_decimal(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Decimal(_) => return Ok(value),
        RowValues::Int(i) => Decimal::from(*i),
        RowValues::Float(f) => Decimal::try_from(*f).map_err(|_| mismatch("decimal", &value))?,
        RowValues::Text(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .map_err(|_| mismatch("decimal", &value))?
        }
        _ => return Err(mismatch("decimal", &value)),
    };
    Ok(RowValues::Decimal(out))
}

fn decode_date(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Date(_) => return Ok(value),
        RowValues::Timestamp(ts) => ts.date(),
        RowValues::TimestampTz(ts) => ts.date_naive(),
        RowValues::Text(s) => parse_date(s).ok_or_else(|| mismatch("date", &value))?,
        _ => return Err(mismatch("date", &value)),
    };
    Ok(RowValues::Date(out))
}

fn decode_datetime(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::Timestamp(_) => return Ok(value),
        RowValues::Date(d) => d.and_time(NaiveTime::MIN),
        RowValues::TimestampTz(ts) => ts.naive_utc(),
        RowValues::Text(s) => parse_naive_datetime(s)
            .or_else(|| parse_datetime_tz(s).map(|ts| ts.naive_utc()))
            .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
            .ok_or_else(|| mismatch("timestamp", &value))?,
        _ => return Err(mismatch("timestamp", &value)),
    };
    Ok(RowValues::Timestamp(out))
}

fn decode_datetime_tz(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::TimestampTz(_) => return Ok(value),
        RowValues::Timestamp(ts) => ts.and_utc().fixed_offset(),
        RowValues::Date(d) => d.and_time(NaiveTime::MIN).and_utc().fixed_offset(),
        RowValues::Text(s) => parse_datetime_tz(s)
            .or_else(|| parse_naive_datetime(s).map(|ts| ts.and_utc().fixed_offset()))
            .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN).and_utc().fixed_offset()))
            .ok_or_else(|| mismatch("timestamp with offset", &value))?,
        _ => return Err(mismatch("timestamp with offset", &value)),
    };
    Ok(RowValues::TimestampTz(out))
}

fn decode_blob(value: RowValues) -> Result<RowValues, QueryFnError> {
    match value {
        RowValues::Null | RowValues::Blob(_) => Ok(value),
        RowValues::Text(s) => Ok(RowValues::Blob(s.into_bytes())),
        other => Err(mismatch("blob", &other)),
    }
}

fn decode_json(value: RowValues) -> Result<RowValues, QueryFnError> {
    let out = match &value {
        RowValues::Null | RowValues::JSON(_) => return Ok(value),
        RowValues::Text(s) => serde_json::from_str(s).map_err(|_| mismatch("json", &value))?,
        RowValues::Int(i) => serde_json::Value::from(*i),
        RowValues::Float(f) => serde_json::Value::from(*f),
        RowValues::Bool(b) => serde_json::Value::from(*b),
        _ => return Err(mismatch("json", &value)),
    };
    Ok(RowValues::JSON(out))
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_naive_datetime(s).map(|ts| ts.date()))
        .or_else(|| parse_datetime_tz(s).map(|ts| ts.date_naive()))
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_datetime_tz(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z").ok())
        .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%:z").ok())
}
