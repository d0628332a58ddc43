//! exec_describe
//! -------------
//! Column-only steps (GetPredictorColumns / GetTableColumns) and literal Data rows.

use anyhow::Result;

use super::context::ExecContext;
use super::exec_fetch::build_result;
use crate::ast::{Expr, Select, Statement, TableExpr};
use crate::datahub::NodeQuery;
use crate::planner::PredictorRef;
use crate::result_set::df_convert::records_to_frame;
use crate::result_set::{Column, Record, ResultSet, TableIdentity};
use crate::session::Session;

pub fn run_predictor_columns(ctx: &ExecContext, session: &Session, namespace: &str, predictor: &PredictorRef) -> Result<ResultSet> {
    let node = session.datahub.get_or_err(namespace)?;
    let model = predictor.model_name();
    let table = TableIdentity::new(Some(ctx.models_database.as_str()), Some(model), None);
    let mut data = ResultSet::new();
    for name in node.get_table_columns(model)? {
        data.add_column(Column::new(name).with_table(&table).into_ref(), None);
    }
    Ok(data)
}

pub fn run_table_columns(ctx: &ExecContext, session: &Session, namespace: &str, table: &str) -> Result<ResultSet> {
    let node = session.datahub.get_or_err(namespace)?;
    let q = Select { limit: Some(Expr::lit(0)), ..Select::star_from(TableExpr::table(table)) };
    let (_, columns) = node.query(NodeQuery::Statement(&Statement::Select(q)), session)?;
    let identity = TableIdentity::new(ctx.database.clone(), Some(table.to_string()), None);
    Ok(build_result(&[], &columns, &identity))
}

pub fn run_data(data: &[Record]) -> Result<ResultSet> {
    let df = records_to_frame(data)?;
    ResultSet::from_df(&df, &TableIdentity::new(Some(""), Some(""), Some("")))
}
