use polars::prelude::DataType;

use crate::ast::{Expr, Join, JoinType, TableExpr};
use crate::config::ExecConfig;
use crate::error::AppError;
use crate::exec::tests::fixtures::*;
use crate::exec::StepExecutor;
use crate::planner::{ApplyPredictorStep, Params, PredictorRef, QueryPlan, Step, StepRef};
use crate::result_set::{Value, FORECAST_OFFSET_COLUMN, ROW_ID_COLUMN};

fn apply(predictor: &str, dataframe: usize) -> ApplyPredictorStep {
    ApplyPredictorStep {
        namespace: "mindsdb".into(),
        predictor: PredictorRef::named(predictor),
        dataframe: StepRef::new(dataframe),
        params: Params::new(),
        output_time_filter: None,
    }
}

fn predict_join_plan() -> QueryPlan {
    let join = Join {
        left: TableExpr::aliased("sales.orders", "o"),
        right: TableExpr::table("mindsdb.price"),
        join_type: JoinType::Join,
        condition: None,
    };
    QueryPlan::new(vec![
        fetch("sales", select_from("sales.orders", Some("o"))),
        Step::ApplyPredictor(apply("price", 0)),
        Step::Join { left: StepRef::new(0), right: StepRef::new(1), query: join },
    ])
}

#[test]
fn predictions_join_back_on_row_id() {
    let f = fixture();
    let out = f.run(predict_join_plan()).unwrap();
    assert_eq!(out.data.len(), 4);
    assert!(out.data.find_columns(Some(ROW_ID_COLUMN), None).is_empty());
    for r in out.data.get_records() {
        let amount = r.get("amount").and_then(|v| v.as_f64()).unwrap();
        assert_eq!(r.get("predicted").and_then(|v| v.as_f64()), Some(amount * 2.0));
    }
    let predicted = out.data.find_columns(Some("predicted"), None);
    assert_eq!(predicted[0].table_name.as_deref(), Some("price"));
    assert_eq!(predicted[0].database.as_deref(), Some("mindsdb"));
}

#[test]
fn identical_inputs_hit_the_cache() {
    let f = fixture();
    let session = f.session();
    let ex = StepExecutor::default();
    ex.execute(&predict_join_plan(), &session, None).unwrap();
    ex.execute(&predict_join_plan(), &session, None).unwrap();
    assert_eq!(f.models.calls("price"), 1);

    let uncached = session.clone().without_predictor_cache();
    ex.execute(&predict_join_plan(), &uncached, None).unwrap();
    assert_eq!(f.models.calls("price"), 2);
}

#[test]
fn empty_input_returns_declared_columns() {
    let f = fixture();
    let mut q = select_from("sales.orders", None);
    q.where_clause = Some(Expr::binary(">", Expr::col("amount"), Expr::lit(1000)));
    let plan = QueryPlan::new(vec![fetch("sales", q), Step::ApplyPredictor(apply("price", 0))]);
    let ex = StepExecutor::default();
    let mut ctx = crate::exec::ExecContext::new(Some("sales".into()), "", "mindsdb");
    let session = f.session();
    ctx.predictor_metadata.push(session.datahub.predictor_metadata("mindsdb", "price").unwrap());
    let fetched = ex.execute_step(&plan.steps[0], &mut ctx, &session).unwrap();
    ctx.steps_data.push(fetched);
    let data = ex.execute_step(&plan.steps[1], &mut ctx, &session).unwrap();
    assert!(data.is_empty());
    assert!(data.is_prediction);
    assert_eq!(data.column_names(), vec!["id", "amount", "predicted", ROW_ID_COLUMN]);
    assert_eq!(f.models.calls("price"), 0);
}

#[test]
fn row_ids_continue_across_predictor_steps() {
    let f = fixture();
    let session = f.session();
    let ex = StepExecutor::default();
    let mut ctx = crate::exec::ExecContext::new(Some("sales".into()), "", "mindsdb");
    ctx.predictor_metadata.push(session.datahub.predictor_metadata("mindsdb", "price").unwrap());
    for step in [fetch("sales", select_from("sales.orders", None)), fetch("sales", select_from("sales.orders", None))] {
        let d = ex.execute_step(&step, &mut ctx, &session).unwrap();
        ctx.steps_data.push(d);
    }
    ex.execute_step(&Step::ApplyPredictor(apply("price", 0)), &mut ctx, &session).unwrap();
    ex.execute_step(&Step::ApplyPredictor(apply("price", 1)), &mut ctx, &session).unwrap();
    let ids = |i: usize| {
        let d = &ctx.steps_data[i];
        let idx = d.column_names().iter().position(|n| n == ROW_ID_COLUMN).unwrap();
        d.column_values(idx)
    };
    assert_eq!(ids(0), (0..4).map(Value::Int).collect::<Vec<_>>());
    assert_eq!(ids(1), (4..8).map(Value::Int).collect::<Vec<_>>());
}

#[test]
fn missing_metadata_is_logic_error() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        fetch("sales", select_from("sales.orders", None)),
        Step::ApplyPredictor(apply("ghost", 0)),
    ]);
    let err = f.run(plan).unwrap_err();
    let app = AppError::classify(&err);
    assert!(matches!(app, AppError::Logic { .. }));
    assert!(app.message().contains("error in apply predictor step"));
}

#[test]
fn timeseries_output_keeps_rows_after_latest() {
    let f = fixture();
    let mut step = apply("forecast", 0);
    step.output_time_filter = Some(Expr::binary(">", Expr::col("t"), Expr::Latest));
    let plan = QueryPlan::new(vec![
        fetch("sales", select_from("sales.sensor", None)),
        Step::ApplyTimeseriesPredictor(step),
    ]).with_query_text("SELECT * FROM sales.sensor JOIN mindsdb.forecast WHERE t > LATEST");
    let out = f.run(plan).unwrap();
    let mut kept: Vec<(String, Value)> = out.data.get_records().iter()
        .map(|r| (r.get("g").unwrap().to_string(), r.get("t").cloned().unwrap()))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(kept, vec![("a".into(), Value::Int(3)), ("b".into(), Value::Int(6))]);
    let offsets = col_values(&out, FORECAST_OFFSET_COLUMN);
    assert!(offsets.iter().all(|v| *v == Value::Int(1)));
}

#[test]
fn predictor_row_backfills_inputs() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        fetch("sales", {
            let mut q = select_from("sales.orders", None);
            q.targets = vec![Expr::func("max", vec![Expr::col("amount")]).alias("m")];
            q
        }),
        Step::ApplyPredictorRow {
            namespace: "mindsdb".into(),
            predictor: PredictorRef::named("price"),
            row_dict: vec![("amount".into(), step_ref_param(0)), ("note".into(), Expr::lit("x"))],
            params: Params::new(),
        },
    ]);
    let out = f.run(plan).unwrap();
    assert!(out.data.len() == 1);
    assert_eq!(col_values(&out, "predicted"), vec![Value::Float(80.0)]);
    assert_eq!(col_values(&out, "note"), vec![Value::from("x")]);
    assert_eq!(out.columns[0].table_name.as_deref(), Some("price"));
}

#[test]
fn predict_mark_is_cleared_after_failure() {
    let f = fixture();
    let tmp = tempfile::tempdir().unwrap();
    let cfg = ExecConfig { process_marks_dir: Some(tmp.path().to_path_buf()), ..Default::default() };
    let plan = QueryPlan::new(vec![
        fetch("sales", select_from("sales.orders", None)),
        Step::ApplyPredictor(apply("ghost", 0)),
    ]);
    assert!(StepExecutor::new(cfg).execute(&plan, &f.session(), None).is_err());
    let dir = tmp.path().join("predict");
    assert!(dir.is_dir(), "mark was raised before the failing step");
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn cache_hit_keeps_prediction_column_types() {
    let f = fixture();
    let session = f.session();
    let ex = StepExecutor::default();
    let predicted_type = || {
        let mut ctx = crate::exec::ExecContext::new(Some("sales".into()), "", "mindsdb");
        ctx.predictor_metadata.push(session.datahub.predictor_metadata("mindsdb", "price").unwrap());
        let fetched = ex.execute_step(&fetch("sales", select_from("sales.orders", None)), &mut ctx, &session).unwrap();
        ctx.steps_data.push(fetched);
        let data = ex.execute_step(&Step::ApplyPredictor(apply("price", 0)), &mut ctx, &session).unwrap();
        data.find_columns(Some("predicted"), None)[0].dtype.clone()
    };
    let miss = predicted_type();
    let hit = predicted_type();
    assert_eq!(f.models.calls("price"), 1);
    assert_eq!(miss, Some(DataType::Float64));
    assert_eq!(hit, miss);
}
