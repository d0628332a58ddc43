//! exec_slice
//! ----------
//! LimitOffset over a step result. Only integer constants apply.

use anyhow::Result;

use super::context::ExecContext;
use crate::ast::Expr;
use crate::planner::StepRef;
use crate::result_set::{ResultSet, Value};

fn int_constant(e: Option<&Expr>) -> Option<usize> {
    match e {
        Some(Expr::Constant(c)) => match c.value {
            Value::Int(i) if i >= 0 => Some(i as usize),
            _ => None,
        },
        _ => None,
    }
}

pub fn run_limit_offset(ctx: &ExecContext, df_ref: &StepRef, limit: Option<&Expr>, offset: Option<&Expr>) -> Result<ResultSet> {
    let src = ctx.step_data(df_ref)?;
    let mut data = ResultSet::with_columns(src.columns().to_vec());
    data.add_raw_values(src.rows().to_vec())?;
    data.slice(int_constant(offset).unwrap_or(0), int_constant(limit));
    Ok(data)
}
