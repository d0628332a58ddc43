//! exec_join
//! ---------
//! Join two step results in the local executor. Both sides are flattened to
//! hashed column names (`A_...` / `B_...`) so equal names from different tables
//! never collide, then mapped back to the original column objects.

use anyhow::Result;
use tracing::debug;

use super::context::ExecContext;
use super::local_sql::LocalExecutor;
use crate::ast::{quote_ident, render_join_condition, Expr, Identifier, Join, JoinType};
use crate::error::AppError;
use crate::planner::StepRef;
use crate::result_set::{ResultSet, ROW_ID_COLUMN};

fn qualified(table: &str, col: &str) -> Expr { Expr::Identifier(Identifier::new([table, col])) }

fn row_id_hash(data: &ResultSet, prefix: &str) -> Result<String> {
    data.find_columns(Some(ROW_ID_COLUMN), None).first()
        .map(|c| c.get_hash_name(prefix))
        .ok_or_else(|| AppError::logic("Prediction result has no row id column").into())
}

fn resolve_side(left: &ResultSet, right: &ResultSet, id: &Identifier) -> Option<Expr> {
    if id.parts.len() != 2 { return None; }
    let (table_alias, alias) = (id.first(), id.last());
    let on_left = left.find_columns(Some(alias), Some(table_alias));
    if on_left.len() == 1 { return Some(qualified("table_a", &on_left[0].get_hash_name("A"))); }
    let on_right = right.find_columns(Some(alias), Some(table_alias));
    if on_right.len() == 1 { return Some(qualified("table_b", &on_right[0].get_hash_name("B"))); }
    None
}

pub fn run_join(local: &dyn LocalExecutor, ctx: &ExecContext, left_ref: &StepRef, right_ref: &StepRef, query: &Join) -> Result<ResultSet> {
    let left = ctx.step_data(left_ref)?;
    let right = ctx.step_data(right_ref)?;
    let (table_a, mut names) = left.to_df_cols("A")?;
    let (table_b, names_b) = right.to_df_cols("B")?;

    let (join_type, condition) = if left.is_prediction || right.is_prediction {
        let cond = Expr::equals(
            qualified("table_a", &row_id_hash(left, "A")?),
            qualified("table_b", &row_id_hash(right, "B")?),
        );
        let join_type = match (query.join_type, left.is_prediction, right.is_prediction) {
            (JoinType::Join, true, false) => JoinType::Left,
            (JoinType::Join, false, true) => JoinType::Right,
            (t, _, _) => t,
        };
        (join_type, Some(cond))
    } else {
        let cond = match &query.condition {
            Some(c) => Some(c.transform(&mut |n| match n {
                Expr::Identifier(id) => resolve_side(left, right, id),
                _ => None,
            })),
            None if query.join_type == JoinType::Cross => None,
            None => return Err(AppError::not_supported("Unable to join table without condition").into()),
        };
        (query.join_type, cond)
    };

    let sql = match condition {
        Some(c) => format!("SELECT * FROM {} {} {} ON {}", quote_ident("table_a"), join_type.sql(), quote_ident("table_b"), render_join_condition(&c)),
        None => format!("SELECT * FROM {} {} {}", quote_ident("table_a"), join_type.sql(), quote_ident("table_b")),
    };
    debug!(target: "conflux::exec", "join: {}", sql);
    let joined = local.run(&sql, vec![("table_a".to_string(), table_a), ("table_b".to_string(), table_b)])?;

    names.extend(names_b);
    let mut data = ResultSet::from_df_cols(&joined, &names, true)?;
    data.replace_nan_with_null();
    Ok(data)
}
