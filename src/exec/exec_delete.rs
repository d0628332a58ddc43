//! exec_delete
//! -----------
//! Delete: forward a DELETE (with step parameters bound) to the owning node.

use anyhow::Result;
use tracing::debug;

use super::context::ExecContext;
use super::exec_fetch::fill_parameters;
use crate::ast::{Delete, Expr, Identifier, Statement};
use crate::datahub::NodeQuery;
use crate::result_set::ResultSet;
use crate::session::Session;

pub fn run_delete(ctx: &ExecContext, session: &Session, table: &Identifier, where_clause: Option<&Expr>) -> Result<ResultSet> {
    let (integration, table_name) = ctx.split_integration(table)?;
    let node = session.datahub.get_or_err(&integration)?;
    let where_clause = where_clause.map(|w| fill_parameters(w, ctx)).transpose()?;
    let delete = Delete { table: table_name, where_clause };
    debug!(target: "conflux::exec", "delete on {}: {}", integration, delete);
    node.query(NodeQuery::Statement(&Statement::Delete(delete)), session)?;
    Ok(ResultSet::new())
}
