//! Conversions between row-major `Value` storage and polars frames.
//! Column dtypes are inferred from the values present: ints, floats, bools, dates and
//! datetimes stay typed; anything mixed falls back to strings.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::{AnyValue, DataFrame, DataType, NamedFrom, Series, TimeUnit};

use super::record::Record;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind { Null, Bool, Int, Float, Date, DateTime, Str }

fn kind_of(v: &Value) -> Kind {
    match v {
        Value::Null => Kind::Null,
        Value::Bool(_) => Kind::Bool,
        Value::Int(_) => Kind::Int,
        Value::Float(_) => Kind::Float,
        Value::Date(_) => Kind::Date,
        Value::DateTime(_) => Kind::DateTime,
        Value::Str(_) | Value::List(_) => Kind::Str,
    }
}

fn merge(a: Kind, b: Kind) -> Kind {
    match (a, b) {
        (Kind::Null, k) | (k, Kind::Null) => k,
        (x, y) if x == y => x,
        (Kind::Int, Kind::Float) | (Kind::Float, Kind::Int) => Kind::Float,
        (Kind::Date, Kind::DateTime) | (Kind::DateTime, Kind::Date) => Kind::DateTime,
        _ => Kind::Str,
    }
}

fn epoch() -> NaiveDate { NaiveDate::from_num_days_from_ce_opt(719_163).unwrap_or_default() }

pub(crate) fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(719_163i32.checked_add(days)?)
}

pub(crate) fn datetime_from(v: i64, tu: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match tu {
        TimeUnit::Nanoseconds => Some(DateTime::<Utc>::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => DateTime::<Utc>::from_timestamp_micros(v),
        TimeUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(v),
    };
    dt.map(|d| d.naive_utc())
}

/// Build one typed series from a column of values. `hint` is only used when no value
/// carries a type (all nulls or no rows).
pub fn values_to_series(name: &str, values: &[&Value], hint: Option<&DataType>) -> Result<Series> {
    let kind = values.iter().fold(Kind::Null, |k, v| merge(k, kind_of(v)));
    let s = match kind {
        Kind::Null => match hint {
            Some(dt) if values.is_empty() => Series::new_empty(name.into(), dt),
            _ => Series::new_null(name.into(), values.len()),
        },
        Kind::Bool => {
            let v: Vec<Option<bool>> = values.iter().map(|v| match v { Value::Bool(b) => Some(*b), _ => None }).collect();
            Series::new(name.into(), v)
        }
        Kind::Int => {
            let v: Vec<Option<i64>> = values.iter().map(|v| match v { Value::Int(i) => Some(*i), _ => None }).collect();
            Series::new(name.into(), v)
        }
        Kind::Float => {
            let v: Vec<Option<f64>> = values.iter().map(|v| match v {
                Value::Float(f) => Some(*f),
                Value::Int(i) => Some(*i as f64),
                _ => None,
            }).collect();
            Series::new(name.into(), v)
        }
        Kind::Date => {
            let base = epoch();
            let v: Vec<Option<i32>> = values.iter().map(|v| match v {
                Value::Date(d) => Some(d.signed_duration_since(base).num_days() as i32),
                _ => None,
            }).collect();
            Series::new(name.into(), v).cast(&DataType::Date)?
        }
        Kind::DateTime => {
            let v: Vec<Option<i64>> = values.iter().map(|v| v.as_datetime().map(|dt| dt.and_utc().timestamp_millis())).collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        Kind::Str => {
            let v: Vec<Option<String>> = values.iter().map(|v| if matches!(v, Value::Null) { None } else { Some(v.to_string()) }).collect();
            Series::new(name.into(), v)
        }
    };
    Ok(s)
}

pub fn any_to_value(av: &AnyValue) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int32(v) => Value::Int(*v as i64),
        AnyValue::Int64(v) => Value::Int(*v),
        AnyValue::UInt32(v) => Value::Int(*v as i64),
        AnyValue::UInt64(v) => Value::Int(*v as i64),
        AnyValue::Float32(v) => Value::Float(*v as f64),
        AnyValue::Float64(v) => Value::Float(*v),
        AnyValue::String(s) => Value::Str(s.to_string()),
        AnyValue::StringOwned(s) => Value::Str(s.to_string()),
        AnyValue::Date(d) => date_from_days(*d).map(Value::Date).unwrap_or(Value::Null),
        AnyValue::Datetime(v, tu, _) => datetime_from(*v, *tu).map(Value::DateTime).unwrap_or(Value::Null),
        AnyValue::List(s) => Value::List((0..s.len()).filter_map(|i| s.get(i).ok()).map(|a| any_to_value(&a)).collect()),
        other => other.extract::<i64>().map(Value::Int).unwrap_or_else(|| Value::Str(other.to_string())),
    }
}

/// Make names unique by appending `_1`, `_2`, ... to repeats.
pub fn unique_names(names: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for n in names {
        let mut candidate = n.clone();
        let mut i = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", n, i);
            i += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Row-major values to a DataFrame. `names` are deduplicated; `hints` may be shorter than `names`.
pub fn rows_to_frame(names: &[String], hints: &[Option<DataType>], rows: &[Vec<Value>]) -> Result<DataFrame> {
    if names.is_empty() { return Ok(DataFrame::empty()); }
    let names = unique_names(names);
    let mut cols: Vec<polars::prelude::Column> = Vec::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        let values: Vec<&Value> = rows.iter().map(|r| r.get(idx).unwrap_or(&Value::Null)).collect();
        let hint = hints.get(idx).and_then(|h| h.as_ref());
        cols.push(values_to_series(name, &values, hint)?.into());
    }
    Ok(DataFrame::new(cols)?)
}

/// DataFrame to row-major values, in frame column order.
pub fn frame_rows(df: &DataFrame) -> Result<Vec<Vec<Value>>> {
    let height = df.height();
    let mut rows: Vec<Vec<Value>> = (0..height).map(|_| Vec::with_capacity(df.width())).collect();
    for c in df.get_columns() {
        for (i, row) in rows.iter_mut().enumerate() {
            row.push(any_to_value(&c.get(i)?));
        }
    }
    Ok(rows)
}

pub fn frame_column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().into_iter().map(|s| s.to_string()).collect()
}

/// Name-keyed records to a DataFrame; the column set is the union of keys in first-seen order.
pub fn records_to_frame(records: &[Record]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for r in records {
        for k in r.keys() {
            if !names.iter().any(|n| n == k) { names.push(k.to_string()); }
        }
    }
    let rows: Vec<Vec<Value>> = records.iter()
        .map(|r| names.iter().map(|n| r.get(n).cloned().unwrap_or(Value::Null)).collect())
        .collect();
    rows_to_frame(&names, &[], &rows)
}

pub fn frame_to_records(df: &DataFrame) -> Result<Vec<Record>> {
    let names = frame_column_names(df);
    let rows = frame_rows(df)?;
    Ok(rows.into_iter().map(|row| names.iter().cloned().zip(row).collect()).collect())
}
