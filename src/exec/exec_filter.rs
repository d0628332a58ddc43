//! exec_filter
//! -----------
//! Filter and Project over a single step result. Column references are resolved
//! against the result's columns and rewritten to their flattened names before the
//! local executor sees them.

use std::collections::HashMap;

use anyhow::Result;

use super::context::ExecContext;
use super::local_sql::{query_df, LocalExecutor};
use crate::ast::{Expr, Identifier, Select};
use crate::error::AppError;
use crate::planner::StepRef;
use crate::result_set::{ColumnRef, ResultSet};

/// Lookup from written column references to flattened names. Later columns win on
/// repeated keys.
#[derive(Default)]
pub(crate) struct ColumnIndex {
    by_alias: HashMap<String, String>,
    by_table: HashMap<(String, String), String>,
    tables: HashMap<String, Vec<String>>,
}

impl ColumnIndex {
    pub(crate) fn build(names: &HashMap<String, ColumnRef>, data: &ResultSet) -> Self {
        let mut idx = ColumnIndex::default();
        // iterate in column order so "later wins" is well defined
        let mut ordered: Vec<(&String, &ColumnRef)> = names.iter().collect();
        ordered.sort_by_key(|(_, c)| data.get_col_index(c));
        for (hashed, col) in ordered {
            let alias = col.alias.to_lowercase();
            idx.by_alias.insert(alias.clone(), hashed.clone());
            for t in [col.table_alias.as_deref(), col.table_name.as_deref()].into_iter().flatten() {
                let t = t.to_lowercase();
                idx.by_table.insert((t.clone(), alias.clone()), hashed.clone());
                let cols = idx.tables.entry(t).or_default();
                if !cols.contains(hashed) { cols.push(hashed.clone()); }
            }
        }
        idx
    }

    pub(crate) fn resolve(&self, id: &Identifier) -> Result<String> {
        let alias = id.last().to_lowercase();
        let hit = if id.parts.len() > 1 {
            let table = id.parts[id.parts.len() - 2].to_lowercase();
            self.by_table.get(&(table, alias))
        } else {
            self.by_alias.get(&alias)
        };
        hit.cloned().ok_or_else(|| AppError::key_column(format!("Table not found for column: {}", id.joined())).into())
    }

    pub(crate) fn table_columns(&self, table: &str) -> &[String] {
        self.tables.get(&table.to_lowercase()).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn rewrite(idx: &ColumnIndex, e: &Expr, place: &str) -> Result<Expr> {
    e.try_transform(&mut |n| match n {
        Expr::Subquery { .. } => Err(AppError::not_supported(format!("Subqueries are not supported in {}", place)).into()),
        Expr::Identifier(id) if !id.is_star() => Ok(Some(Expr::Identifier(Identifier::new([idx.resolve(id)?])))),
        _ => Ok(None),
    })
}

pub fn run_filter(local: &dyn LocalExecutor, ctx: &ExecContext, df_ref: &StepRef, query: &Expr) -> Result<ResultSet> {
    let data = ctx.step_data(df_ref)?;
    let (frame, names) = data.to_df_cols("")?;
    let idx = ColumnIndex::build(&names, data);
    let where_clause = rewrite(&idx, query, "WHERE")?;
    let q = Select { targets: vec![Expr::Star], where_clause: Some(where_clause), ..Default::default() };
    let out = query_df(local, frame, &q)?;
    ResultSet::from_df_cols(&out, &names, true)
}

pub fn run_project(local: &dyn LocalExecutor, ctx: &ExecContext, df_ref: &StepRef, columns: &[Expr]) -> Result<ResultSet> {
    let data = ctx.step_data(df_ref)?;
    let (frame, names) = data.to_df_cols("")?;
    let idx = ColumnIndex::build(&names, data);
    let mut targets = Vec::with_capacity(columns.len());
    for c in columns {
        match c {
            Expr::Identifier(id) if id.is_star() && id.parts.len() > 1 => {
                let table = &id.parts[id.parts.len() - 2];
                targets.extend(idx.table_columns(table).iter().map(|h| Expr::Identifier(Identifier::new([h.as_str()]))));
            }
            Expr::Star => targets.push(Expr::Star),
            Expr::Identifier(id) if id.is_star() => targets.push(Expr::Star),
            other => targets.push(rewrite(&idx, other, "select targets")?),
        }
    }
    let q = Select { targets, ..Default::default() };
    let out = query_df(local, frame, &q)?;
    ResultSet::from_df_cols(&out, &names, false)
}
