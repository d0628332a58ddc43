use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::steps::Step;
use crate::error::AppError;
use crate::result_set::{Column, ColumnRef, TableIdentity, Value};

/// Declared output column, as the planner describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub table_alias: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl ColumnSpec {
    pub fn to_column(&self) -> ColumnRef {
        let t = TableIdentity { database: self.database.clone(), table_name: self.table_name.clone(), table_alias: self.table_alias.clone() };
        let mut c = Column::new(self.name.as_str()).with_table(&t);
        if let Some(a) = &self.alias { c = c.with_alias(a.as_str()); }
        c.into_ref()
    }
}

/// What the executor needs from a planner.
pub trait Planner {
    /// Steps to run, in order. `params` are bind values for prepared statements.
    fn execute_steps(&self, params: Option<&[Value]>) -> Result<Vec<Step>>;
    /// Declared output columns, if the planner fixed them.
    fn statement_columns(&self) -> Option<Vec<ColumnRef>>;
    /// Original query text (consulted for the `LATEST` comparison form).
    fn query_text(&self) -> &str;
    /// Outer SQL to run over the final result, reading it as table `dataframe`.
    fn outer_query(&self) -> Option<&str>;
}

/// A precomputed plan, e.g. loaded from JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryPlan {
    pub steps: Vec<Step>,
    #[serde(default)]
    pub columns: Option<Vec<ColumnSpec>>,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub outer_query: Option<String>,
}

impl QueryPlan {
    pub fn new(steps: Vec<Step>) -> Self { Self { steps, ..Default::default() } }

    pub fn with_query_text(mut self, text: &str) -> Self {
        let (inner, outer) = split_outer_query(text);
        self.query_text = inner;
        if self.outer_query.is_none() { self.outer_query = outer; }
        self
    }

    /// Parse a serialized plan. Unknown step kinds are rejected here as logic errors.
    pub fn from_json(text: &str) -> Result<Self> {
        let plan: QueryPlan = serde_json::from_str(text)
            .map_err(|e| AppError::logic(format!("invalid query plan: {}", e)))
            .context("loading query plan")?;
        Ok(plan)
    }
}

impl Planner for QueryPlan {
    /// Steps of a serialized plan are already bound; `params` are ignored.
    fn execute_steps(&self, _params: Option<&[Value]>) -> Result<Vec<Step>> { Ok(self.steps.clone()) }

    fn statement_columns(&self) -> Option<Vec<ColumnRef>> {
        self.columns.as_ref().map(|cols| cols.iter().map(ColumnSpec::to_column).collect())
    }

    fn query_text(&self) -> &str { &self.query_text }

    fn outer_query(&self) -> Option<&str> { self.outer_query.as_deref() }
}

static VIRTUAL_TABLE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?is)^(?P<head>.*?\bFROM\s*)\((?P<inner>.*)\)\s*AS\s+virtual_table\b(?P<tail>.*)$").ok()
});

/// Split `SELECT ... FROM (<inner>) AS virtual_table ...` into the inner SQL and an
/// outer query that reads from `dataframe`. Other text is returned unchanged.
pub fn split_outer_query(sql: &str) -> (String, Option<String>) {
    match VIRTUAL_TABLE_RE.as_ref().and_then(|re| re.captures(sql)) {
        Some(caps) => {
            let outer = format!("{}dataframe AS virtual_table{}", &caps["head"], &caps["tail"]);
            (caps["inner"].trim().to_string(), Some(outer))
        }
        None => (sql.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_virtual_table_wrapper() {
        let (inner, outer) = split_outer_query(
            "SELECT count(*) FROM (SELECT * FROM sales.orders WHERE amount > 1) AS virtual_table LIMIT 10",
        );
        assert_eq!(inner, "SELECT * FROM sales.orders WHERE amount > 1");
        assert_eq!(outer.as_deref(), Some("SELECT count(*) FROM dataframe AS virtual_table LIMIT 10"));
    }

    #[test]
    fn plain_query_untouched() {
        let (inner, outer) = split_outer_query("SELECT 1");
        assert_eq!(inner, "SELECT 1");
        assert!(outer.is_none());
    }

    #[test]
    fn unknown_step_is_logic_error() {
        let err = QueryPlan::from_json(r#"{"steps":[{"step":"teleport"}]}"#).unwrap_err();
        assert!(matches!(AppError::classify(&err), AppError::Logic { .. }));
    }
}
