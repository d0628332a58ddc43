//! exec_select
//! -----------
//! GroupBy and SubSelect: run a planner-supplied select over one step result in
//! the local executor and re-attach table identity to the output.

use anyhow::Result;
use tracing::debug;

use super::context::ExecContext;
use super::local_sql::{query_df, LocalExecutor};
use crate::ast::{Expr, Select};
use crate::planner::StepRef;
use crate::result_set::{Column, ResultSet, TableIdentity};

pub fn run_group_by(local: &dyn LocalExecutor, ctx: &mut ExecContext, df_ref: &StepRef, targets: &[Expr], columns: &[Expr]) -> Result<ResultSet> {
    let (frame, table) = {
        let data = ctx.step_data(df_ref)?;
        (data.to_df()?, data.get_tables().into_iter().next().unwrap_or_default())
    };
    let q = Select { targets: targets.to_vec(), group_by: columns.to_vec(), ..Default::default() };
    let out = query_df(local, frame, &q)?;
    let data = ResultSet::from_df(&out, &table)?;
    // output columns are the grouped ones from here on
    ctx.columns_list = Some(data.columns().to_vec());
    Ok(data)
}

pub fn run_sub_select(
    local: &dyn LocalExecutor,
    ctx: &mut ExecContext,
    df_ref: &StepRef,
    query: &Select,
    table_name: Option<&str>,
    add_absent_cols: bool,
) -> Result<ResultSet> {
    let table_name = table_name.unwrap_or("df_table");
    if add_absent_cols {
        let mut referenced: Vec<String> = Vec::new();
        if let Some(w) = &query.where_clause {
            w.visit(&mut |e| {
                if let Expr::Identifier(id) = e {
                    if !id.is_star() && !referenced.iter().any(|r| r == id.last()) { referenced.push(id.last().to_string()); }
                }
            });
        }
        let data = ctx.step_data_mut(df_ref)?;
        let present: Vec<String> = data.columns().iter().map(|c| c.name.clone()).collect();
        for name in referenced.into_iter().filter(|n| !present.contains(n)) {
            debug!(target: "conflux::exec", "sub select: adding absent column {}", name);
            data.add_column(Column::new(name).into_ref(), None);
        }
    }
    let data = ctx.step_data(df_ref)?;
    let database = data.columns().first().and_then(|c| c.database.clone());
    let out = query_df(local, data.to_df()?, query)?;
    ResultSet::from_df(&out, &TableIdentity::new(database, Some(table_name.to_string()), None))
}
