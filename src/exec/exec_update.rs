//! exec_update
//! -----------
//! UpdateToTable. Two shapes:
//! * key mode (`keys` set): one UPDATE per input row, key columns in WHERE and the
//!   rest in SET;
//! * pass-through: the statement as written, with `alias.col` references to the
//!   input rows bound per row (or sent once when there is no input).

use anyhow::Result;
use tracing::debug;

use super::context::ExecContext;
use crate::ast::{Expr, Identifier, Statement, Update};
use crate::datahub::NodeQuery;
use crate::error::AppError;
use crate::planner::StepRef;
use crate::result_set::{Record, ResultSet};
use crate::session::Session;

fn placeholder(name: &str) -> Expr { Expr::Placeholder { name: name.to_string() } }

fn keyed_update(table: &Identifier, keys: &[Identifier], data: &ResultSet) -> Result<(Update, Vec<String>)> {
    let keys: Vec<String> = keys.iter().map(|k| k.joined()).collect();
    if keys.is_empty() {
        return Err(AppError::wrong_arguments("No key columns in update statement").into());
    }
    let mut conditions = Vec::new();
    let mut update_columns = Vec::new();
    let mut params = Vec::new();
    for col in data.columns() {
        let name = col.alias.clone();
        if keys.iter().any(|k| *k == col.name) {
            conditions.push(Expr::equals(Expr::Identifier(Identifier::new([name.as_str()])), placeholder(&name)));
        } else {
            update_columns.push((col.name.clone(), placeholder(&name)));
        }
        params.push(name);
    }
    if update_columns.is_empty() {
        return Err(AppError::wrong_arguments("No columns for update found").into());
    }
    let update = Update {
        table: table.clone(),
        update_columns,
        where_clause: Expr::conjunction(conditions),
        keys: None,
        from_select_alias: None,
    };
    Ok((update, params))
}

fn bind_sources(cmd: &Update, table: &Identifier, alias: &str) -> Result<(Update, Vec<String>)> {
    let mut params: Vec<String> = Vec::new();
    let table_prefix = table.first().to_string();
    let bound = cmd.try_transform_exprs(&mut |n| {
        let Expr::Identifier(id) = n else { return Ok(None) };
        if id.parts.len() > 1 && id.first() == alias {
            let name = id.last().to_string();
            if !params.contains(&name) { params.push(name.clone()); }
            return Ok(Some(placeholder(&name)));
        }
        if id.parts.len() > 1 && id.first() == table_prefix {
            return Ok(Some(Expr::Identifier(Identifier::new(id.parts[1..].iter().cloned()))));
        }
        Ok(None)
    })?;
    Ok((Update { table: table.clone(), keys: None, from_select_alias: None, ..bound }, params))
}

fn bind_row(update: &Update, row: &Record) -> Result<Update> {
    update.try_transform_exprs(&mut |n| match n {
        Expr::Placeholder { name } => Ok(Some(Expr::lit(row.get(name).cloned().unwrap_or_default()))),
        _ => Ok(None),
    })
}

pub fn run_update(ctx: &ExecContext, session: &Session, table: &Identifier, dataframe: Option<&StepRef>, cmd: &Update) -> Result<ResultSet> {
    let (integration, table_name) = ctx.split_integration(table)?;
    let node = session.datahub.get_or_err(&integration)?;

    let (update, params, data) = match (&cmd.keys, dataframe) {
        (Some(keys), Some(r)) => {
            let data = ctx.step_data(r)?;
            let (u, p) = keyed_update(&table_name, keys, data)?;
            (u, p, data)
        }
        (Some(_), None) => return Err(AppError::logic("Keyed update requires input data").into()),
        (None, None) => {
            let update = Update { table: table_name, keys: None, from_select_alias: None, ..cmd.clone() };
            node.query(NodeQuery::Statement(&Statement::Update(update)), session)?;
            return Ok(ResultSet::new());
        }
        (None, Some(r)) => {
            let alias = cmd.from_select_alias.as_deref()
                .ok_or_else(|| AppError::wrong_arguments("Subselect in update requires alias"))?;
            let (u, p) = bind_sources(cmd, &table_name, alias)?;
            (u, p, ctx.step_data(r)?)
        }
    };

    let header = data.column_names();
    if let Some(missing) = params.iter().find(|p| !header.contains(p)) {
        return Err(AppError::wrong_arguments(format!(
            "Field {} not found in input data. Input fields: {}", missing, header.join(", ")
        )).into());
    }

    debug!(target: "conflux::exec", "update {} rows in {}.{}", data.len(), integration, table_name.joined());
    for row in data.get_records() {
        let bound = bind_row(&update, &row)?;
        node.query(NodeQuery::Statement(&Statement::Update(bound)), session)?;
    }
    Ok(ResultSet::new())
}
