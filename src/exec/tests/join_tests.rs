use crate::ast::{Expr, Join, JoinType, TableExpr};
use crate::error::AppError;
use crate::exec::tests::fixtures::*;
use crate::planner::{QueryPlan, Step, StepRef};
use crate::result_set::Value;

fn join_query(join_type: JoinType, condition: Option<Expr>) -> Join {
    Join {
        left: TableExpr::aliased("sales.orders", "o"),
        right: TableExpr::aliased("sales.regions", "r"),
        join_type,
        condition,
    }
}

fn steps(join: Join) -> Vec<Step> {
    vec![
        fetch("sales", select_from("sales.orders", Some("o"))),
        fetch("sales", select_from("sales.regions", Some("r"))),
        Step::Join { left: StepRef::new(0), right: StepRef::new(1), query: join },
    ]
}

#[test]
fn inner_join_keeps_both_region_columns() {
    let f = fixture();
    let cond = Expr::equals(Expr::col("o.region"), Expr::col("r.region"));
    let out = f.run(QueryPlan::new(steps(join_query(JoinType::Inner, Some(cond))))).unwrap();
    assert_eq!(out.data.len(), 3);
    // same alias, different tables: still two distinct columns
    let regions = out.data.find_columns(Some("region"), None);
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].table_alias.as_deref(), Some("o"));
    assert_eq!(regions[1].table_alias.as_deref(), Some("r"));
    let mut managers: Vec<String> = col_values(&out, "manager").iter().map(|v| v.to_string()).collect();
    managers.sort();
    assert_eq!(managers, vec!["ann", "ann", "bob"]);
}

#[test]
fn left_join_fills_missing_with_null() {
    let f = fixture();
    let cond = Expr::equals(Expr::col("o.region"), Expr::col("r.region"));
    let out = f.run(QueryPlan::new(steps(join_query(JoinType::Left, Some(cond))))).unwrap();
    assert_eq!(out.data.len(), 4);
    let apac = out.data.get_records().into_iter().find(|r| r.get("id") == Some(&Value::Int(4))).unwrap();
    assert_eq!(apac.get("manager"), Some(&Value::Null));
}

#[test]
fn join_without_condition_is_not_supported() {
    let f = fixture();
    let err = f.run(QueryPlan::new(steps(join_query(JoinType::Inner, None)))).unwrap_err();
    let app = AppError::classify(&err);
    assert!(matches!(app, AppError::NotSupported { .. }));
    assert!(app.message().contains("error in join step"));
}

#[test]
fn cross_join_needs_no_condition() {
    let f = fixture();
    let out = f.run(QueryPlan::new(steps(join_query(JoinType::Cross, None)))).unwrap();
    assert_eq!(out.data.len(), 8);
}
