//! exec_map_reduce
//! ---------------
//! MapReduce: re-run a fetch template once per driving row, with `$var[...]`
//! constants bound to that row's values, and union the results.
//! MultipleSteps: run independent steps and union them.

use anyhow::Result;
use tracing::debug;

use super::context::ExecContext;
use super::exec_fetch::run_fetch;
use super::exec_union::append_by_name;
use super::query_vars::{mark_query_var, replace_query_var};
use super::StepExecutor;
use crate::error::AppError;
use crate::planner::{FetchDataframeStep, Step, StepRef};
use crate::result_set::{Record, ResultSet, ROW_ID_COLUMN};
use crate::session::Session;

fn fetch_templates(step: &Step) -> Result<Vec<FetchDataframeStep>> {
    match step {
        Step::FetchDataframe(f) => Ok(vec![f.clone()]),
        Step::MultipleSteps { steps, reduce } => {
            if reduce != "union" {
                return Err(AppError::logic(format!("Unknown MultipleSteps type: {}", reduce)).into());
            }
            steps.iter().map(|s| match s {
                Step::FetchDataframe(f) => Ok(f.clone()),
                other => Err(AppError::logic(format!("Wrong step type for MultipleSteps: {}", other.kind_name())).into()),
            }).collect()
        }
        other => Err(AppError::logic(format!("Unknown step type: {}", other.kind_name())).into()),
    }
}

fn mark_template(f: &mut FetchDataframeStep) {
    if let Some(w) = f.query.as_mut().and_then(|q| q.where_clause.as_mut()) { mark_query_var(w); }
}

fn bind_group(f: &mut FetchDataframeStep, group: &Record) {
    if let Some(w) = f.query.as_mut().and_then(|q| q.where_clause.as_mut()) {
        for (name, value) in group.iter() { replace_query_var(w, value, name); }
    }
}

pub fn run_map_reduce(ctx: &ExecContext, session: &Session, values: &StepRef, reduce: &str, step: &Step) -> Result<ResultSet> {
    if reduce != "union" {
        return Err(AppError::logic(format!("Unknown MapReduce type: {}", reduce)).into());
    }
    let mut templates = fetch_templates(step)?;
    for t in templates.iter_mut() { mark_template(t); }

    let groups: Vec<Record> = ctx.step_data(values)?.get_records().into_iter()
        .map(|mut r| { r.remove(ROW_ID_COLUMN); r })
        .collect();
    debug!(target: "conflux::exec", "map reduce over {} groups x {} fetches", groups.len(), templates.len());

    let mut data = ResultSet::new();
    for group in &groups {
        for template in &templates {
            // Each group binds a fresh copy; the planned step stays untouched.
            let mut bound = template.clone();
            bind_group(&mut bound, group);
            data = append_by_name(data, run_fetch(ctx, session, &bound)?);
        }
    }
    Ok(data)
}

pub fn run_multiple_steps(ex: &StepExecutor, ctx: &mut ExecContext, session: &Session, steps: &[Step], reduce: &str) -> Result<ResultSet> {
    if reduce != "union" {
        return Err(AppError::not_supported(format!("Only union is supported for MultipleSteps, got: {}", reduce)).into());
    }
    let mut data = ResultSet::new();
    for step in steps {
        let part = ex.execute_step(step, ctx, session)?;
        data = append_by_name(data, part);
    }
    Ok(data)
}
