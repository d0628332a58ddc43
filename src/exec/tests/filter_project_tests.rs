use crate::ast::{Expr, Select};
use crate::error::AppError;
use crate::exec::tests::fixtures::*;
use crate::planner::{QueryPlan, Step, StepRef};
use crate::result_set::Value;

fn orders() -> Step { fetch("sales", select_from("sales.orders", Some("o"))) }

#[test]
fn filter_keeps_column_identity() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        orders(),
        Step::Filter { dataframe: StepRef::new(0), query: Expr::binary(">=", Expr::col("o.amount"), Expr::lit(30)) },
    ]);
    let out = f.run(plan).unwrap();
    assert_eq!(col_values(&out, "id"), vec![Value::Int(3), Value::Int(4)]);
    assert_eq!(out.columns[0].table_alias.as_deref(), Some("o"));
}

#[test]
fn filter_on_unknown_column_is_key_error() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        orders(),
        Step::Filter { dataframe: StepRef::new(0), query: Expr::equals(Expr::col("x.missing"), Expr::lit(1)) },
    ]);
    let err = f.run(plan).unwrap_err();
    assert!(matches!(AppError::classify(&err), AppError::KeyColumn { .. }));
}

#[test]
fn filter_rejects_subqueries() {
    let f = fixture();
    let sub = Expr::Subquery { query: Box::new(select_from("sales.regions", None)) };
    let plan = QueryPlan::new(vec![
        orders(),
        Step::Filter { dataframe: StepRef::new(0), query: Expr::binary("in", Expr::col("region"), sub) },
    ]);
    let err = f.run(plan).unwrap_err();
    assert!(matches!(AppError::classify(&err), AppError::NotSupported { .. }));
}

#[test]
fn project_expands_table_star_and_aliases() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        orders(),
        Step::Project {
            dataframe: StepRef::new(0),
            columns: vec![Expr::col("o.*"), Expr::col("o.amount").alias("amt")],
        },
    ]);
    let out = f.run(plan).unwrap();
    assert_eq!(out.data.column_names(), vec!["id", "region", "amount", "amt"]);
    assert_eq!(col_values(&out, "amt")[0], Value::Float(10.0));
    assert_eq!(out.columns[0].table_alias.as_deref(), Some("o"));
    assert_eq!(out.columns[3].table_alias, None);
}

#[test]
fn limit_offset_slices_rows() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        orders(),
        Step::LimitOffset { dataframe: StepRef::new(0), limit: Some(Expr::lit(2)), offset: Some(Expr::lit(1)) },
    ]);
    let out = f.run(plan).unwrap();
    assert_eq!(col_values(&out, "id"), vec![Value::Int(2), Value::Int(3)]);
    let plan = QueryPlan::new(vec![
        orders(),
        Step::LimitOffset { dataframe: StepRef::new(0), limit: None, offset: Some(Expr::lit(10)) },
    ]);
    assert!(f.run(plan).unwrap().data.is_empty());
}

#[test]
fn group_by_resets_output_columns() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        orders(),
        Step::GroupBy {
            dataframe: StepRef::new(0),
            targets: vec![Expr::col("o.region"), Expr::func("sum", vec![Expr::col("o.amount")]).alias("total")],
            columns: vec![Expr::col("o.region")],
        },
        Step::LimitOffset { dataframe: StepRef::new(1), limit: None, offset: None },
    ]);
    let out = f.run(plan).unwrap();
    let names: Vec<&str> = out.columns.iter().map(|c| c.alias.as_str()).collect();
    assert_eq!(names, vec!["region", "total"]);
    assert_eq!(out.data.len(), 3);
    let mut totals: Vec<(String, f64)> = out.data.get_records().iter()
        .map(|r| (r.get("region").unwrap().to_string(), r.get("total").and_then(|v| v.as_f64()).unwrap()))
        .collect();
    totals.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(totals, vec![("apac".into(), 40.0), ("eu".into(), 40.0), ("us".into(), 20.0)]);
}

#[test]
fn sub_select_adds_absent_columns() {
    let f = fixture();
    let mut q = Select { targets: vec![Expr::col("id")], ..Default::default() };
    q.where_clause = Some(Expr::binary("or", Expr::binary(">", Expr::col("amount"), Expr::lit(35)), Expr::binary("is", Expr::col("nope"), Expr::lit(Value::Null))));
    let plan = QueryPlan::new(vec![
        orders(),
        Step::SubSelect { dataframe: StepRef::new(0), query: q, table_name: Some("s".into()), add_absent_cols: true },
    ]);
    let out = f.run(plan).unwrap();
    // every row matches through the null column
    assert_eq!(out.data.len(), 4);
    assert_eq!(out.columns[0].table_name.as_deref(), Some("s"));
    assert_eq!(out.columns[0].database.as_deref(), Some("sales"));
}
