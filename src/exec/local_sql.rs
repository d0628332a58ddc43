//! Local relational executor: SQL over named in-memory frames.

use anyhow::{Context, Result};
use polars::prelude::{DataFrame, IntoLazy};
use polars::sql::SQLContext;
use tracing::debug;

use crate::ast::{Expr, Identifier, Select, TableExpr};

pub trait LocalExecutor: Send + Sync {
    fn run(&self, sql: &str, tables: Vec<(String, DataFrame)>) -> Result<DataFrame>;
}

/// Registers each table as a lazy frame in a fresh `SQLContext`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolarsSqlExecutor;

impl LocalExecutor for PolarsSqlExecutor {
    fn run(&self, sql: &str, tables: Vec<(String, DataFrame)>) -> Result<DataFrame> {
        debug!(target: "conflux::exec", "local sql: {}", sql);
        let mut ctx = SQLContext::new();
        for (name, df) in tables {
            ctx.register(&name, df.lazy());
        }
        let lf = ctx.execute(sql).with_context(|| format!("local query failed: {}", sql))?;
        Ok(lf.collect()?)
    }
}

fn unqualify(n: &Expr) -> Option<Expr> {
    match n {
        Expr::Identifier(i) if i.is_star() => Some(Expr::Star),
        Expr::Identifier(i) if i.parts.len() > 1 => Some(Expr::Identifier(Identifier::new([i.last()]))),
        _ => None,
    }
}

/// Drop table qualifiers from column references (`t.a` -> `a`); qualified stars become `*`.
pub fn strip_qualifiers(e: &Expr) -> Expr { e.transform(&mut unqualify) }

/// Run a single-table select over `df`, whatever its original FROM clause said.
pub fn query_df(exec: &dyn LocalExecutor, df: DataFrame, query: &Select) -> Result<DataFrame> {
    let stripped = query.try_transform_exprs(&mut |n| Ok(unqualify(n)))?;
    let q = Select { from_table: Some(TableExpr::table("df")), ..stripped };
    exec.run(&q.to_string(), vec![("df".to_string(), df)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{NamedFrom, Series};

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("a".into(), &[1i64, 2, 3]).into(),
            Series::new("b".into(), &["x", "y", "z"]).into(),
        ]).unwrap()
    }

    #[test]
    fn runs_sql_over_registered_frame() {
        let out = PolarsSqlExecutor.run("SELECT \"a\" FROM \"t\" WHERE (\"a\" > 1)", vec![("t".into(), frame())]).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn query_df_ignores_original_source() {
        let mut q = Select::star_from(TableExpr::aliased("db.orders", "o"));
        q.targets = vec![Expr::col("o.b")];
        q.where_clause = Some(Expr::equals(Expr::col("o.a"), Expr::lit(2)));
        let out = query_df(&PolarsSqlExecutor, frame(), &q).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.column("b").unwrap().str().unwrap().get(0), Some("y"));
    }
}
