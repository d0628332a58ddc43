//! exec_union
//! ----------
//! Union of two step results, positional, with optional row dedupe.

use std::collections::HashSet;

use anyhow::Result;
use xxhash_rust::xxh3::xxh3_128;

use crate::error::AppError;
use crate::result_set::{ResultSet, Value};

fn row_hash(row: &[Value]) -> u128 { xxh3_128(format!("{:?}", row).as_bytes()) }

/// Rows of `left` then `right` under `left`'s columns. `unique` keeps the first
/// occurrence of each distinct row.
pub fn run_union(left: &ResultSet, right: &ResultSet, unique: bool) -> Result<ResultSet> {
    if left.columns().len() != right.columns().len() {
        return Err(AppError::wrong_arguments(format!(
            "UNION inputs have different column counts: {} and {}",
            left.columns().len(),
            right.columns().len()
        )).into());
    }
    let mut data = ResultSet::with_columns(left.columns().to_vec());
    let mut seen: HashSet<u128> = HashSet::new();
    for row in left.rows().iter().chain(right.rows()) {
        if unique && !seen.insert(row_hash(row)) { continue; }
        data.add_record_raw(row.clone())?;
    }
    Ok(data)
}

/// Accumulate `source` into `target` by column name; an empty target takes `source` whole.
pub(crate) fn append_by_name(target: ResultSet, source: ResultSet) -> ResultSet {
    if target.columns().is_empty() { return source; }
    let mut target = target;
    target.add_records(&source.get_records());
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_set::Column;

    fn rs(col: &str, values: &[i64]) -> ResultSet {
        let mut r = ResultSet::with_columns(vec![Column::new(col).into_ref()]);
        r.add_raw_values(values.iter().map(|v| vec![Value::Int(*v)]).collect()).unwrap();
        r
    }

    #[test]
    fn union_all_keeps_duplicates_distinct_drops_them() {
        let a = rs("x", &[1, 2]);
        let b = rs("y", &[2, 3]);
        let all = run_union(&a, &b, false).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.column_names(), vec!["x"]);
        let distinct = run_union(&a, &b, true).unwrap();
        let vals: Vec<Value> = distinct.column_values(0);
        assert_eq!(vals, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let a = rs("x", &[1]);
        let mut b = rs("x", &[1]);
        b.add_column(Column::new("z").into_ref(), None);
        let err = run_union(&a, &b, false).unwrap_err();
        assert!(matches!(AppError::classify(&err), AppError::WrongArguments { .. }));
    }

    #[test]
    fn append_into_empty_takes_source() {
        let merged = append_by_name(ResultSet::new(), rs("x", &[1]));
        assert_eq!(merged.len(), 1);
        let merged = append_by_name(merged, rs("x", &[2]));
        assert_eq!(merged.column_values(0), vec![Value::Int(1), Value::Int(2)]);
    }
}
