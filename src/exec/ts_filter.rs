//! Post-prediction filtering of time-series output rows by the original predicate
//! on the model's order column, including the `LATEST` per-group maximum.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::ast::{Constant, Expr};
use crate::datahub::PredictorMetadata;
use crate::result_set::{Record, Value};

/// How values of the order column are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDomain {
    Integer,
    Float,
    Date,
    DateTime,
    /// Compared as produced.
    Opaque,
}

impl OrderDomain {
    /// Declared model type first; a runtime date-like sample otherwise.
    pub fn resolve(declared: Option<&str>, sample: Option<&Value>) -> Self {
        match declared {
            Some("integer") => OrderDomain::Integer,
            Some("float") => OrderDomain::Float,
            Some("date") => OrderDomain::Date,
            Some("datetime") => OrderDomain::DateTime,
            _ => match sample {
                Some(Value::DateTime(_)) => OrderDomain::DateTime,
                Some(Value::Date(_)) => OrderDomain::Date,
                _ => OrderDomain::Opaque,
            },
        }
    }

    fn is_temporal(self) -> bool { matches!(self, OrderDomain::Date | OrderDomain::DateTime) }
}

static DATE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").ok());

const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y%m%d",
];

fn parse_with(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, fmt).ok()
        .or_else(|| NaiveDate::parse_from_str(s, fmt).ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// First format that parses every sample: ISO date, then ISO date-time, then a
/// fixed fallback list.
pub fn infer_date_format(samples: &[&str]) -> Option<&'static str> {
    let first = samples.first()?;
    let iso = DATE_RE.as_ref().is_some_and(|re| re.is_match(first));
    let mut candidates: Vec<&'static str> = Vec::new();
    if iso { candidates.extend(["%Y-%m-%d", "%Y-%m-%d %H:%M:%S"]); }
    candidates.extend(FALLBACK_FORMATS);
    candidates.into_iter().find(|fmt| samples.iter().all(|s| parse_with(s, fmt).is_some()))
}

fn numeric(v: &Value, domain: OrderDomain) -> Value {
    let parsed = match v {
        Value::Str(s) => {
            let s = s.trim();
            match domain {
                OrderDomain::Integer => s.parse::<i64>().ok().map(Value::Int)
                    .or_else(|| s.parse::<f64>().ok().map(|f| Value::Int(f.trunc() as i64))),
                _ => s.parse::<f64>().ok().map(Value::Float),
            }
        }
        Value::Date(_) | Value::DateTime(_) => v.as_datetime().map(|dt| Value::Int(dt.and_utc().timestamp())),
        Value::Float(f) if domain == OrderDomain::Integer && f.is_finite() => Some(Value::Int(f.trunc() as i64)),
        _ => None,
    };
    parsed.unwrap_or_else(|| v.clone())
}

/// Coerce a batch of order values into the domain. Strings are parsed with one
/// format inferred from the whole batch; dates are widened to midnight.
fn coerce_all(values: &mut [&mut Value], domain: OrderDomain) {
    match domain {
        OrderDomain::Integer | OrderDomain::Float => {
            for v in values.iter_mut() {
                let n = numeric(v, domain);
                **v = n;
            }
        }
        OrderDomain::Date | OrderDomain::DateTime => {
            let samples: Vec<String> = values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            let refs: Vec<&str> = samples.iter().map(String::as_str).collect();
            let fmt = infer_date_format(&refs);
            if fmt.is_none() && !refs.is_empty() {
                debug!(target: "conflux::exec", "no date format matches order values, e.g. {:?}", refs.first());
            }
            for v in values.iter_mut() {
                let next = match &**v {
                    Value::Str(s) => fmt.and_then(|f| parse_with(s, f)).map(Value::DateTime),
                    Value::Date(d) => d.and_hms_opt(0, 0, 0).map(Value::DateTime),
                    _ => None,
                };
                if let Some(n) = next { **v = n; }
            }
        }
        OrderDomain::Opaque => {}
    }
}

fn coerce_column(rows: &mut [Record], col: &str, domain: OrderDomain) {
    let mut cells: Vec<&mut Value> = rows.iter_mut()
        .filter_map(|r| r.get_mut(col))
        .collect();
    coerce_all(&mut cells, domain);
}

fn coerce_constants(e: &mut Expr, domain: OrderDomain) {
    let mut cells: Vec<&mut Value> = Vec::new();
    collect_constants(e, &mut cells);
    coerce_all(&mut cells, domain);
}

fn collect_constants<'a>(e: &'a mut Expr, out: &mut Vec<&'a mut Value>) {
    match e {
        Expr::Constant(Constant { value, .. }) => out.push(value),
        Expr::BinaryOp { left, right, .. } => { collect_constants(left, out); collect_constants(right, out); }
        Expr::Between { arg, low, high } => {
            collect_constants(arg, out);
            collect_constants(low, out);
            collect_constants(high, out);
        }
        _ => {}
    }
}

type GroupKey = Vec<String>;

fn group_key(row: &Record, group_cols: &[String]) -> GroupKey {
    group_cols.iter().map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string())).collect()
}

fn passes(op: &str, ord: Ordering) -> bool {
    match op {
        "<" => ord == Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        ">=" => ord != Ordering::Less,
        "=" => ord == Ordering::Equal,
        _ => false,
    }
}

const KNOWN_OPS: &[&str] = &["<", "<=", ">", ">=", "="];

fn on_order_col(e: &Expr, order_col: &str) -> bool {
    matches!(e, Expr::Identifier(id) if id.last() == order_col)
}

/// Filter `predictions` by `filter`. Rows are returned untouched when there is no
/// predicate, when it does not constrain the order column, or when its operator is
/// not a comparison.
pub fn apply_ts_filter(
    mut predictions: Vec<Record>,
    inputs: &[Record],
    filter: Option<&Expr>,
    meta: &PredictorMetadata,
) -> Vec<Record> {
    let Some(filter) = filter else { return predictions };
    let Some(order_col) = meta.order_by_column.as_deref() else { return predictions };
    let applies = match filter {
        Expr::BinaryOp { op, left, .. } => {
            if !KNOWN_OPS.contains(&op.as_str()) {
                debug!(target: "conflux::exec", "time series filter: unsupported operator {}", op);
                return predictions;
            }
            on_order_col(left, order_col)
        }
        Expr::Between { arg, .. } => on_order_col(arg, order_col),
        _ => true,
    };
    if !applies { return predictions; }

    let sample = predictions.first().and_then(|r| r.get(order_col));
    let domain = OrderDomain::resolve(meta.dtypes.get(order_col).map(String::as_str), sample);
    let mut inputs = inputs.to_vec();
    let mut filter = filter.clone();
    if domain != OrderDomain::Opaque {
        coerce_column(&mut predictions, order_col, domain);
        coerce_column(&mut inputs, order_col, domain);
        coerce_constants(&mut filter, domain);
    }
    if domain.is_temporal() {
        debug!(target: "conflux::exec", "time series filter over {} as {:?}", order_col, domain);
    }

    let group_cols = &meta.group_by_columns;
    let mut latest: HashMap<GroupKey, Value> = HashMap::new();
    let mut has_latest = false;
    filter.visit(&mut |e| { if matches!(e, Expr::Latest) { has_latest = true; } });
    if has_latest {
        for row in &inputs {
            let Some(v) = row.get(order_col) else { continue };
            if v.is_null() { continue; }
            let key = group_key(row, group_cols);
            match latest.get(&key) {
                Some(cur) if cur.compare(v) != Some(Ordering::Less) => {}
                _ => { latest.insert(key, v.clone()); }
            }
        }
    }

    // Operand value for a row, or None when the row cannot be evaluated.
    let operand = |e: &Expr, row: &Record| -> Option<Option<Value>> {
        match e {
            Expr::Latest => Some(latest.get(&group_key(row, group_cols)).cloned()),
            Expr::Constant(c) => Some(Some(c.value.clone())),
            _ => None,
        }
    };

    predictions.retain(|row| {
        let val = row.get(order_col).cloned().unwrap_or_default();
        match &filter {
            Expr::Between { low, high, .. } => match (operand(low, row), operand(high, row)) {
                (Some(lo), Some(hi)) => match (lo, hi) {
                    (Some(lo), Some(hi)) => {
                        val.compare(&lo).is_some_and(|o| o != Ordering::Less)
                            && val.compare(&hi).is_some_and(|o| o != Ordering::Greater)
                    }
                    _ => false,
                },
                _ => true,
            },
            Expr::BinaryOp { op, right, .. } => match operand(right, row) {
                Some(Some(arg)) => val.compare(&arg).is_some_and(|ord| passes(op, ord)),
                // group has no input values
                Some(None) => false,
                None => true,
            },
            _ => true,
        }
    });
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(dtype: &str, groups: &[&str]) -> PredictorMetadata {
        PredictorMetadata {
            name: "m".into(),
            project: "mindsdb".into(),
            timeseries: true,
            order_by_column: Some("t".into()),
            group_by_columns: groups.iter().map(|s| s.to_string()).collect(),
            dtypes: [("t".to_string(), dtype.to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    fn row(g: &str, t: Value) -> Record { Record::from([("g", Value::from(g)), ("t", t)]) }

    #[test]
    fn latest_is_per_group() {
        let inputs = vec![row("a", Value::Int(3)), row("a", Value::Int(5)), row("b", Value::Int(2))];
        let preds = vec![
            row("a", Value::Int(5)), row("a", Value::Int(6)),
            row("b", Value::Int(2)), row("b", Value::Int(3)),
            row("c", Value::Int(9)),
        ];
        let f = Expr::binary(">", Expr::col("t"), Expr::Latest);
        let out = apply_ts_filter(preds, &inputs, Some(&f), &meta("integer", &["g"]));
        let kept: Vec<_> = out.iter().map(|r| (r.get("g").unwrap().to_string(), r.get("t").unwrap().clone())).collect();
        assert_eq!(kept, vec![("a".to_string(), Value::Int(6)), ("b".to_string(), Value::Int(3))]);
    }

    #[test]
    fn string_dates_are_parsed_before_compare() {
        let preds = vec![
            row("a", Value::from("2024-01-01")),
            row("a", Value::from("2024-01-05")),
            row("a", Value::from("2024-02-01")),
        ];
        let f = Expr::Between {
            arg: Box::new(Expr::col("t")),
            low: Box::new(Expr::lit("2024-01-02")),
            high: Box::new(Expr::lit("2024-01-31")),
        };
        let out = apply_ts_filter(preds, &[], Some(&f), &meta("date", &[]));
        assert_eq!(out.len(), 1);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(out[0].get("t"), Some(&Value::DateTime(expected)));
    }

    #[test]
    fn numeric_strings_follow_declared_type() {
        let preds = vec![row("a", Value::from("10")), row("a", Value::from("2"))];
        let f = Expr::binary(">=", Expr::col("t"), Expr::lit("5"));
        let out = apply_ts_filter(preds, &[], Some(&f), &meta("integer", &[]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("t"), Some(&Value::Int(10)));
    }

    #[test]
    fn other_columns_and_operators_pass_through() {
        let preds = vec![row("a", Value::Int(1)), row("b", Value::Int(2))];
        let on_group = Expr::binary("=", Expr::col("g"), Expr::lit("a"));
        assert_eq!(apply_ts_filter(preds.clone(), &[], Some(&on_group), &meta("integer", &[])).len(), 2);
        let like = Expr::binary("like", Expr::col("t"), Expr::lit("1%"));
        assert_eq!(apply_ts_filter(preds.clone(), &[], Some(&like), &meta("integer", &[])).len(), 2);
        assert_eq!(apply_ts_filter(preds, &[], None, &meta("integer", &[])).len(), 2);
    }

    #[test]
    fn infers_iso_then_fallback_formats() {
        assert_eq!(infer_date_format(&["2024-01-01"]), Some("%Y-%m-%d"));
        assert_eq!(infer_date_format(&["2024-01-01 10:00:00"]), Some("%Y-%m-%d %H:%M:%S"));
        assert_eq!(infer_date_format(&["2024/01/31"]), Some("%Y/%m/%d"));
        assert_eq!(infer_date_format(&["not a date"]), None);
        assert_eq!(infer_date_format(&[]), None);
    }

    #[test]
    fn domain_from_runtime_sample() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(OrderDomain::resolve(None, Some(&Value::DateTime(dt))), OrderDomain::DateTime);
        assert_eq!(OrderDomain::resolve(Some("float"), None), OrderDomain::Float);
        assert_eq!(OrderDomain::resolve(Some("categorical"), Some(&Value::Int(1))), OrderDomain::Opaque);
    }
}
