//! exec_fetch
//! ----------
//! FetchDataframe: send a query (with earlier step results bound in) to one node.

use anyhow::Result;
use tracing::debug;

use super::context::ExecContext;
use crate::ast::{Expr, Select, Statement, TableExpr};
use crate::datahub::{ColumnInfo, NodeQuery};
use crate::error::AppError;
use crate::planner::{FetchDataframeStep, StepRef};
use crate::result_set::{Column, ResultSet, TableIdentity, Value};
use crate::session::Session;

/// Database, table name and alias a FROM clause stands for.
pub(crate) fn table_identity(from: Option<&TableExpr>, default_db: Option<&str>) -> TableIdentity {
    let db = default_db.map(str::to_string);
    match from {
        Some(TableExpr::Table { name, alias }) => {
            let (database, table) = if name.parts.len() > 1 {
                (Some(name.first().to_string()), name.last().to_string())
            } else {
                (db, name.last().to_string())
            };
            let alias = alias.clone().unwrap_or_else(|| table.clone());
            TableIdentity { database, table_name: Some(table), table_alias: Some(alias) }
        }
        Some(TableExpr::Subquery { alias, .. }) => {
            let name = alias.clone().unwrap_or_else(|| "t".to_string());
            TableIdentity { database: db, table_name: Some(name.clone()), table_alias: Some(name) }
        }
        Some(TableExpr::Join(j)) => table_identity(Some(&j.left), default_db),
        None => TableIdentity { database: db, table_name: Some("t".into()), table_alias: Some("t".into()) },
    }
}

/// First column of a step result: a scalar when it has exactly one row, a tuple otherwise.
fn step_value(ctx: &ExecContext, r: &StepRef, as_list: bool) -> Result<Expr> {
    let data = ctx.step_data(r)?;
    let values: Vec<Value> = data.rows().iter().map(|row| row.first().cloned().unwrap_or_default()).collect();
    if values.len() == 1 && !as_list {
        return Ok(Expr::lit(values.into_iter().next().unwrap_or_default()));
    }
    Ok(Expr::Tuple { items: values.into_iter().map(Expr::lit).collect() })
}

fn is_membership(op: &str) -> bool { matches!(op.to_ascii_lowercase().as_str(), "in" | "not in") }

fn bind_node(ctx: &ExecContext, n: &Expr) -> Result<Option<Expr>> {
    match n {
        Expr::Parameter { step_num } => Ok(Some(step_value(ctx, &StepRef::new(*step_num), false)?)),
        Expr::BinaryOp { op, left, right } if is_membership(op) => match right.as_ref() {
            Expr::Parameter { step_num } => Ok(Some(Expr::BinaryOp {
                op: op.clone(),
                left: Box::new(fill_parameters(left, ctx)?),
                right: Box::new(step_value(ctx, &StepRef::new(*step_num), true)?),
            })),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Replace step parameters with the referenced results. The right side of
/// `IN`/`NOT IN` always becomes a tuple.
pub(crate) fn fill_parameters(e: &Expr, ctx: &ExecContext) -> Result<Expr> {
    e.try_transform(&mut |n| bind_node(ctx, n))
}

pub(crate) fn fill_select_parameters(q: &Select, ctx: &ExecContext) -> Result<Select> {
    q.try_transform_exprs(&mut |n| bind_node(ctx, n))
}

pub(crate) fn build_result(rows: &[crate::result_set::Record], columns: &[ColumnInfo], table: &TableIdentity) -> ResultSet {
    let mut data = ResultSet::new();
    for c in columns {
        data.add_column(Column::new(&c.name).with_table(table).with_type(c.dtype.clone()).into_ref(), None);
    }
    data.add_records(rows);
    data
}

pub fn run_fetch(ctx: &ExecContext, session: &Session, step: &FetchDataframeStep) -> Result<ResultSet> {
    let node = session.datahub.get(&step.integration)
        .ok_or_else(|| AppError::unknown(format!("Unknown integration name: {}", step.integration)))?;

    if let Some(raw) = &step.raw_query {
        let table = TableIdentity::new(ctx.database.clone(), Some("result".into()), Some("result".into()));
        let (rows, columns) = node.query(NodeQuery::Native(raw), session)?;
        return Ok(build_result(&rows, &columns, &table));
    }

    let query = step.query.as_ref()
        .ok_or_else(|| AppError::logic("Fetch step has neither a query nor a native query"))?;
    let table = table_identity(query.from_table.as_ref(), ctx.database.as_deref());
    let query = fill_select_parameters(query, ctx)?;
    debug!(target: "conflux::exec", "fetch from {}: {}", step.integration, query);
    let (rows, columns) = node.query(NodeQuery::Statement(&Statement::Select(query)), session)?;
    Ok(build_result(&rows, &columns, &table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Identifier;

    fn ctx_with(values: Vec<Value>) -> ExecContext {
        let mut ctx = ExecContext::new(Some("db".into()), "", "mindsdb");
        let mut rs = ResultSet::with_columns(vec![Column::new("x").into_ref()]);
        rs.add_raw_values(values.into_iter().map(|v| vec![v]).collect()).unwrap();
        ctx.steps_data.push(rs);
        ctx
    }

    #[test]
    fn single_row_binds_scalar_many_rows_bind_tuple() {
        let e = Expr::equals(Expr::col("a"), Expr::Parameter { step_num: 0 });
        let one = fill_parameters(&e, &ctx_with(vec![Value::Int(4)])).unwrap();
        assert_eq!(one.to_string(), "(\"a\" = 4)");
        let many = fill_parameters(&e, &ctx_with(vec![Value::Int(4), Value::Int(5)])).unwrap();
        assert_eq!(many.to_string(), "(\"a\" = (4, 5))");
    }

    #[test]
    fn membership_always_binds_tuple() {
        let e = Expr::binary("in", Expr::col("a"), Expr::Parameter { step_num: 0 });
        let one = fill_parameters(&e, &ctx_with(vec![Value::Int(4)])).unwrap();
        assert_eq!(one.to_string(), "(\"a\" IN (4))");
    }

    #[test]
    fn missing_step_is_logic_error() {
        let e = Expr::Parameter { step_num: 3 };
        let err = fill_parameters(&e, &ctx_with(vec![])).unwrap_err();
        assert!(matches!(AppError::classify(&err), AppError::Logic { .. }));
    }

    #[test]
    fn identity_from_from_clause() {
        let t = TableExpr::Table { name: Identifier::from_dotted("int1.orders"), alias: Some("o".into()) };
        let id = table_identity(Some(&t), Some("db"));
        assert_eq!(id.database.as_deref(), Some("int1"));
        assert_eq!(id.table_name.as_deref(), Some("orders"));
        assert_eq!(id.table_alias.as_deref(), Some("o"));
        let bare = table_identity(Some(&TableExpr::table("orders")), Some("db"));
        assert_eq!(bare.database.as_deref(), Some("db"));
        assert_eq!(bare.table_alias.as_deref(), Some("orders"));
        assert_eq!(table_identity(None, None).table_name.as_deref(), Some("t"));
    }
}
