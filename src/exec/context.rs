//! Query-scoped execution state threaded through every step call.

use anyhow::Result;

use crate::ast::Identifier;
use crate::datahub::PredictorMetadata;
use crate::error::AppError;
use crate::planner::StepRef;
use crate::result_set::{ColumnRef, ResultSet, Value};

#[derive(Debug, Default)]
pub struct ExecContext {
    /// Step results by position; append-only.
    pub steps_data: Vec<ResultSet>,
    /// Next row identity handed to predictor input rows.
    pub row_id: i64,
    pub predictor_metadata: Vec<PredictorMetadata>,
    /// Declared output columns (planner-supplied, reset by group-by and the outer query).
    pub columns_list: Option<Vec<ColumnRef>>,
    pub query_text: String,
    pub database: Option<String>,
    pub models_database: String,
}

impl ExecContext {
    pub fn new(database: Option<String>, query_text: &str, models_database: &str) -> Self {
        Self { database, query_text: query_text.to_string(), models_database: models_database.to_string(), ..Default::default() }
    }

    pub fn step_data(&self, r: &StepRef) -> Result<&ResultSet> {
        self.steps_data.get(r.step_num)
            .ok_or_else(|| AppError::logic(format!("Step {} has no result yet", r.step_num)).into())
    }

    pub fn step_data_mut(&mut self, r: &StepRef) -> Result<&mut ResultSet> {
        self.steps_data.get_mut(r.step_num)
            .ok_or_else(|| AppError::logic(format!("Step {} has no result yet", r.step_num)).into())
    }

    /// Reserve `n` consecutive row ids.
    pub fn next_row_ids(&mut self, n: usize) -> Vec<Value> {
        let start = self.row_id;
        self.row_id += n as i64;
        (start..self.row_id).map(Value::Int).collect()
    }

    pub fn find_predictor(&self, project: &str, name: &str) -> Result<PredictorMetadata> {
        self.predictor_metadata.iter()
            .find(|p| p.name == name && p.project.eq_ignore_ascii_case(project))
            .cloned()
            .ok_or_else(|| AppError::logic(format!("Predictor metadata not found: {}.{}", project, name)).into())
    }

    /// `integration.table...` -> (integration, table...); a bare name uses the current database.
    pub fn split_integration(&self, table: &Identifier) -> Result<(String, Identifier)> {
        if table.parts.len() > 1 {
            return Ok((table.parts[0].clone(), Identifier::new(table.parts[1..].iter().cloned())));
        }
        match &self.database {
            Some(db) => Ok((db.clone(), table.clone())),
            None => Err(AppError::logic(format!("No database selected for table {}", table.joined())).into()),
        }
    }
}
