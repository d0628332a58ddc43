// Step executor: runs a planned step list against the data hub.
// NOTE: keep this module thin; per-step logic lives in exec_*.rs files.
pub mod context;
pub mod local_sql;
pub mod query_vars;
pub mod ts_filter;
mod exec_delete;    // Delete
mod exec_describe;  // column-only steps and literal Data
mod exec_fetch;     // FetchDataframe, parameter binding
mod exec_filter;    // Filter and Project
mod exec_insert;    // SaveToTable / InsertToTable
mod exec_join;      // Join
mod exec_map_reduce; // MapReduce / MultipleSteps
mod exec_predict;   // predictor steps
mod exec_select;    // GroupBy / SubSelect
mod exec_slice;     // LimitOffset
mod exec_union;     // Union
mod exec_update;    // UpdateToTable

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::ExecConfig;
use crate::error::{AppError, AppResult};
use crate::planner::{Planner, Step};
use crate::process_mark::ProcessMark;
use crate::result_set::{ColumnRef, ResultSet, TableIdentity, Value, ROW_ID_COLUMN};
use crate::session::Session;

pub use context::ExecContext;
pub use local_sql::{LocalExecutor, PolarsSqlExecutor};

/// Final query result plus the columns to report to the client.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub data: ResultSet,
    pub columns: Vec<ColumnRef>,
}

pub struct StepExecutor {
    local: Arc<dyn LocalExecutor>,
    config: ExecConfig,
}

impl Default for StepExecutor {
    fn default() -> Self { Self::new(ExecConfig::default()) }
}

impl StepExecutor {
    pub fn new(config: ExecConfig) -> Self { Self { local: Arc::new(PolarsSqlExecutor), config } }

    pub fn with_local_executor(mut self, local: Arc<dyn LocalExecutor>) -> Self {
        self.local = local;
        self
    }

    pub fn config(&self) -> &ExecConfig { &self.config }

    pub fn local(&self) -> &dyn LocalExecutor { self.local.as_ref() }

    /// Plan, run every step in order, then apply the outer query if any.
    pub fn execute(&self, planner: &dyn Planner, session: &Session, params: Option<&[Value]>) -> Result<QueryOutput> {
        let steps = planner.execute_steps(params).context("error in planning")?;
        let database = session.database.clone().or_else(|| self.config.default_database.clone());
        let mut ctx = ExecContext::new(database, planner.query_text(), &self.config.models_database);
        ctx.columns_list = planner.statement_columns();

        let predictors: Vec<(String, String)> = steps.iter()
            .flat_map(|s| s.predictors())
            .map(|(ns, p)| (ns.to_string(), p.model_name().to_string()))
            .collect();
        for (project, name) in &predictors {
            if ctx.predictor_metadata.iter().any(|m| m.name == *name && m.project.eq_ignore_ascii_case(project)) { continue; }
            if let Some(meta) = session.datahub.predictor_metadata(project, name) {
                ctx.predictor_metadata.push(meta);
            }
        }
        // cleared on every exit path, including errors
        let _mark = (!predictors.is_empty())
            .then(|| ProcessMark::create("predict", self.config.process_marks_dir.as_deref()));

        info!(target: "conflux::exec", "executing {} steps", steps.len());
        for (idx, step) in steps.iter().enumerate() {
            debug!(target: "conflux::exec", "step {}: {}", idx, step.kind_name());
            let data = self.execute_step(step, &mut ctx, session)
                .with_context(|| format!("error in {} step (step {})", step.kind_name(), idx))?;
            ctx.steps_data.push(data);
        }

        let Some(mut data) = ctx.steps_data.pop() else { return Ok(QueryOutput::default()) };

        if let Some(outer) = planner.outer_query() {
            let df = data.to_df()?;
            let out = self.local.run(outer, vec![("dataframe".to_string(), df)])
                .context("error in preparing result query step")?;
            data = ResultSet::from_df(&out, &TableIdentity::new(Some(""), Some(""), None))?;
            ctx.columns_list = Some(data.columns().to_vec());
        }

        for col in data.find_columns(Some(ROW_ID_COLUMN), None) {
            data.del_column(&col)?;
        }
        let columns: Vec<ColumnRef> = ctx.columns_list.take()
            .map(|cols| cols.into_iter().filter(|c| c.alias != ROW_ID_COLUMN).collect())
            .unwrap_or_else(|| data.columns().to_vec());
        Ok(QueryOutput { data, columns })
    }

    /// Run one step against the current context without recording its result.
    pub fn execute_step(&self, step: &Step, ctx: &mut ExecContext, session: &Session) -> Result<ResultSet> {
        let local = self.local.as_ref();
        match step {
            Step::GetPredictorColumns { namespace, predictor } => exec_describe::run_predictor_columns(ctx, session, namespace, predictor),
            Step::GetTableColumns { namespace, table } => exec_describe::run_table_columns(ctx, session, namespace, table),
            Step::FetchDataframe(f) => exec_fetch::run_fetch(ctx, session, f),
            Step::Union { left, right, unique } => exec_union::run_union(ctx.step_data(left)?, ctx.step_data(right)?, *unique),
            Step::MapReduce { values, reduce, step } => exec_map_reduce::run_map_reduce(ctx, session, values, reduce, step),
            Step::MultipleSteps { steps, reduce } => exec_map_reduce::run_multiple_steps(self, ctx, session, steps, reduce),
            Step::ApplyPredictorRow { namespace, predictor, row_dict, params } => {
                exec_predict::run_predictor_row(ctx, session, namespace, predictor, row_dict, params)
            }
            Step::ApplyPredictor(s) | Step::ApplyTimeseriesPredictor(s) => exec_predict::run_apply_predictor(self, ctx, session, s),
            Step::Join { left, right, query } => exec_join::run_join(local, ctx, left, right, query),
            Step::Filter { dataframe, query } => exec_filter::run_filter(local, ctx, dataframe, query),
            Step::LimitOffset { dataframe, limit, offset } => {
                exec_slice::run_limit_offset(ctx, dataframe, limit.as_ref(), offset.as_ref())
            }
            Step::Project { dataframe, columns } => exec_filter::run_project(local, ctx, dataframe, columns),
            Step::GroupBy { dataframe, targets, columns } => exec_select::run_group_by(local, ctx, dataframe, targets, columns),
            Step::SubSelect { dataframe, query, table_name, add_absent_cols } => {
                exec_select::run_sub_select(local, ctx, dataframe, query, table_name.as_deref(), *add_absent_cols)
            }
            Step::SaveToTable { table, dataframe, query, is_replace } => {
                exec_insert::run_save(ctx, session, table, dataframe.as_ref(), query.as_ref(), *is_replace, true)
            }
            Step::InsertToTable { table, dataframe, query } => {
                exec_insert::run_save(ctx, session, table, dataframe.as_ref(), query.as_ref(), false, false)
            }
            Step::UpdateToTable { table, dataframe, update_command } => {
                exec_update::run_update(ctx, session, table, dataframe.as_ref(), update_command)
            }
            Step::Delete { table, where_clause } => exec_delete::run_delete(ctx, session, table, where_clause.as_ref()),
            Step::Data { data } => exec_describe::run_data(data),
        }
    }
}

/// Execute with the default executor and classify any failure.
pub fn execute(planner: &dyn Planner, session: &Session, params: Option<&[Value]>) -> AppResult<QueryOutput> {
    StepExecutor::default().execute(planner, session, params).map_err(|e| {
        let err = AppError::classify(&e);
        tracing::warn!(target: "conflux::exec", "query failed: {}", err);
        err
    })
}
