use crate::ast::{Expr, Insert, Update};
use crate::datahub::DataNode;
use crate::error::AppError;
use crate::exec::tests::fixtures::*;
use crate::planner::{ColumnSpec, QueryPlan, Step, StepRef};
use crate::result_set::{Record, Value};

#[test]
fn save_to_table_creates_and_replaces() {
    let f = fixture();
    let mut q = select_from("sales.orders", None);
    q.where_clause = Some(Expr::binary("<", Expr::col("id"), Expr::lit(3)));
    let plan = QueryPlan::new(vec![
        fetch("sales", q),
        Step::SaveToTable { table: ident("sales.small"), dataframe: Some(StepRef::new(0)), query: None, is_replace: false },
    ]);
    let out = f.run(plan.clone()).unwrap();
    assert!(out.data.is_empty());
    assert_eq!(f.sales.table_records("small").unwrap().len(), 2);

    // creating again without replace fails, with replace overwrites
    assert!(f.run(plan.clone()).is_err());
    let mut replace = plan;
    if let Step::SaveToTable { is_replace, .. } = &mut replace.steps[1] { *is_replace = true; }
    f.run(replace).unwrap();
    assert_eq!(f.sales.table_records("small").unwrap().len(), 2);
}

#[test]
fn insert_values_append_to_existing_table() {
    let f = fixture();
    let ins = Insert {
        table: ident("sales.regions"),
        columns: vec!["region".into(), "manager".into()],
        values: vec![vec![Value::from("apac"), Value::from("cy")]],
    };
    let plan = QueryPlan::new(vec![Step::InsertToTable { table: ident("sales.regions"), dataframe: None, query: Some(ins) }]);
    f.run(plan).unwrap();
    let rows = f.sales.table_records("regions").unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].get("manager"), Some(&Value::from("cy")));
}

#[test]
fn insert_drops_undeclared_and_service_columns() {
    let f = fixture();
    let mut plan = QueryPlan::new(vec![
        fetch("sales", select_from("sales.regions", None)),
        Step::InsertToTable { table: ident("sales.archive"), dataframe: Some(StepRef::new(0)), query: None },
    ]);
    plan.columns = Some(vec![ColumnSpec { name: "region".into(), ..Default::default() }]);
    f.run(plan).unwrap();
    assert_eq!(f.sales.get_table_columns("archive").unwrap(), vec!["region"]);
}

#[test]
fn insert_without_data_is_logic_error() {
    let f = fixture();
    let plan = QueryPlan::new(vec![Step::InsertToTable { table: ident("sales.regions"), dataframe: None, query: None }]);
    let err = f.run(plan).unwrap_err();
    assert!(matches!(AppError::classify(&err), AppError::Logic { .. }));
}

#[test]
fn project_nodes_cannot_create_tables() {
    let f = fixture();
    let plan = QueryPlan::new(vec![
        Step::Data { data: vec![Record::from([("x", Value::Int(1))])] },
        Step::SaveToTable { table: ident("mindsdb.t"), dataframe: Some(StepRef::new(0)), query: None, is_replace: true },
    ]);
    let err = f.run(plan).unwrap_err();
    assert!(matches!(AppError::classify(&err), AppError::NotSupported { .. }));
}

#[test]
fn keyed_update_runs_once_per_row() {
    let f = fixture();
    let data = vec![
        Record::from([("id", Value::Int(1)), ("amount", Value::Float(11.0))]),
        Record::from([("id", Value::Int(4)), ("amount", Value::Float(44.0))]),
    ];
    let cmd = Update {
        table: ident("sales.orders"),
        update_columns: vec![],
        where_clause: None,
        keys: Some(vec![ident("id")]),
        from_select_alias: None,
    };
    let plan = QueryPlan::new(vec![
        Step::Data { data },
        Step::UpdateToTable { table: ident("sales.orders"), dataframe: Some(StepRef::new(0)), update_command: cmd },
    ]);
    f.run(plan).unwrap();
    let amounts: Vec<Value> = f.sales.table_records("orders").unwrap().iter().map(|r| r.get("amount").cloned().unwrap()).collect();
    assert_eq!(amounts, vec![Value::Float(11.0), Value::Float(20.0), Value::Float(30.0), Value::Float(44.0)]);
}

#[test]
fn update_from_select_binds_alias_columns() {
    let f = fixture();
    let cmd = Update {
        table: ident("sales.orders"),
        update_columns: vec![("region".into(), Expr::col("s.region"))],
        where_clause: Some(Expr::equals(Expr::col("orders.id"), Expr::col("s.id"))),
        keys: None,
        from_select_alias: Some("s".into()),
    };
    let plan = QueryPlan::new(vec![
        Step::Data { data: vec![Record::from([("id", Value::Int(2)), ("region", Value::from("latam"))])] },
        Step::UpdateToTable { table: ident("sales.orders"), dataframe: Some(StepRef::new(0)), update_command: cmd.clone() },
    ]);
    f.run(plan).unwrap();
    let rows = f.sales.table_records("orders").unwrap();
    assert_eq!(rows[1].get("region"), Some(&Value::from("latam")));
    assert_eq!(rows[0].get("region"), Some(&Value::from("eu")));

    // referenced input field missing from the data
    let mut bad = cmd;
    bad.update_columns = vec![("region".into(), Expr::col("s.nope"))];
    let plan = QueryPlan::new(vec![
        Step::Data { data: vec![Record::from([("id", Value::Int(2))])] },
        Step::UpdateToTable { table: ident("sales.orders"), dataframe: Some(StepRef::new(0)), update_command: bad },
    ]);
    let err = f.run(plan).unwrap_err();
    assert!(matches!(AppError::classify(&err), AppError::WrongArguments { .. }));
}

#[test]
fn plain_update_runs_verbatim() {
    let f = fixture();
    let cmd = Update {
        table: ident("sales.orders"),
        update_columns: vec![("amount".into(), Expr::lit(0.0))],
        where_clause: Some(Expr::equals(Expr::col("region"), Expr::lit("eu"))),
        keys: None,
        from_select_alias: None,
    };
    f.run(QueryPlan::new(vec![Step::UpdateToTable { table: ident("sales.orders"), dataframe: None, update_command: cmd }])).unwrap();
    let zeroed = f.sales.table_records("orders").unwrap().iter().filter(|r| r.get("amount") == Some(&Value::Float(0.0))).count();
    assert_eq!(zeroed, 2);
}

#[test]
fn delete_binds_step_parameters() {
    let f = fixture();
    let mut q = select_from("sales.regions", None);
    q.targets = vec![Expr::col("region")];
    let plan = QueryPlan::new(vec![
        fetch("sales", q),
        Step::Delete {
            table: ident("sales.orders"),
            where_clause: Some(Expr::binary("in", Expr::col("region"), step_ref_param(0))),
        },
    ]);
    f.run(plan).unwrap();
    let left: Vec<Value> = f.sales.table_records("orders").unwrap().iter().map(|r| r.get("id").cloned().unwrap()).collect();
    assert_eq!(left, vec![Value::Int(4)]);
}
