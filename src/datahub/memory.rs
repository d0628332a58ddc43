//! In-memory integration backed by polars frames, plus a catalog over named nodes.
//! Selects run through the local executor; UPDATE and DELETE are rewritten into
//! selects whose result replaces the stored frame.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use polars::prelude::{DataFrame, DataType, Series};
use tracing::debug;

use super::{ColumnInfo, DataHub, DataNode, NodeQuery, PredictorMetadata};
use crate::ast::{quote_ident, Delete, Identifier, Insert, Select, Statement, TableExpr, Update};
use crate::error::AppError;
use crate::exec::local_sql::{LocalExecutor, PolarsSqlExecutor};
use crate::result_set::df_convert::{frame_column_names, frame_to_records, records_to_frame, rows_to_frame};
use crate::result_set::{Record, ResultSet};
use crate::session::Session;

pub struct MemoryDataNode {
    name: String,
    tables: RwLock<HashMap<String, DataFrame>>,
    executor: Arc<dyn LocalExecutor>,
}

impl MemoryDataNode {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), tables: RwLock::new(HashMap::new()), executor: Arc::new(PolarsSqlExecutor) }
    }

    pub fn with_table(self, table: &str, df: DataFrame) -> Self {
        self.insert_table(table, df);
        self
    }

    pub fn insert_table(&self, table: &str, df: DataFrame) {
        self.tables.write().insert(table.to_string(), df);
    }

    pub fn insert_records(&self, table: &str, records: &[Record]) -> Result<()> {
        let df = records_to_frame(records)?;
        self.insert_table(table, df);
        Ok(())
    }

    fn resolve_name(&self, table: &str) -> Option<String> {
        let tables = self.tables.read();
        if tables.contains_key(table) { return Some(table.to_string()); }
        let lower = table.to_lowercase();
        tables.keys().find(|k| k.to_lowercase() == lower).cloned()
    }

    pub fn table(&self, table: &str) -> Option<DataFrame> {
        let name = self.resolve_name(table)?;
        self.tables.read().get(&name).cloned()
    }

    pub fn table_records(&self, table: &str) -> Result<Vec<Record>> {
        match self.table(table) {
            Some(df) => frame_to_records(&df),
            None => Err(AppError::logic(format!("Table '{}' not found in '{}'", table, self.name)).into()),
        }
    }

    fn table_or_err(&self, id: &Identifier) -> Result<(String, DataFrame)> {
        let name = self.resolve_name(id.last())
            .ok_or_else(|| AppError::logic(format!("Table '{}' not found in '{}'", id.joined(), self.name)))?;
        let df = self.tables.read().get(&name).cloned()
            .ok_or_else(|| AppError::logic(format!("Table '{}' not found in '{}'", name, self.name)))?;
        Ok((name, df))
    }

    fn all_tables(&self) -> Vec<(String, DataFrame)> {
        self.tables.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn run_select(&self, q: &Select) -> Result<DataFrame> {
        let q = Select { from_table: q.from_table.as_ref().map(|t| self.local_table_expr(t)), ..q.clone() };
        self.executor.run(&q.to_string(), self.all_tables())
    }

    /// Point table references at stored frames: the integration prefix is dropped and
    /// the stored name is used, keeping the written name as alias.
    fn local_table_expr(&self, t: &TableExpr) -> TableExpr {
        match t {
            TableExpr::Table { name, alias } => {
                let stored = self.resolve_name(name.last()).unwrap_or_else(|| name.last().to_string());
                let alias = alias.clone().or_else(|| if stored != name.last() || name.parts.len() > 1 { Some(name.last().to_string()) } else { None });
                TableExpr::Table { name: Identifier::new([stored]), alias }
            }
            TableExpr::Subquery { query, alias } => TableExpr::Subquery {
                query: Box::new(Select { from_table: query.from_table.as_ref().map(|t| self.local_table_expr(t)), ..(**query).clone() }),
                alias: alias.clone(),
            },
            TableExpr::Join(j) => {
                let mut j = (**j).clone();
                j.left = self.local_table_expr(&j.left);
                j.right = self.local_table_expr(&j.right);
                TableExpr::Join(Box::new(j))
            }
        }
    }

    fn run_update(&self, u: &Update) -> Result<()> {
        let (name, df) = self.table_or_err(&u.table)?;
        let mut targets = Vec::with_capacity(df.width());
        for col in frame_column_names(&df) {
            let set = u.update_columns.iter().find(|(c, _)| c.eq_ignore_ascii_case(&col)).map(|(_, e)| e);
            let item = match (set, &u.where_clause) {
                (Some(value), Some(cond)) => format!("CASE WHEN {} THEN {} ELSE {} END AS {}", cond, value, quote_ident(&col), quote_ident(&col)),
                (Some(value), None) => format!("{} AS {}", value, quote_ident(&col)),
                (None, _) => quote_ident(&col),
            };
            targets.push(item);
        }
        let sql = format!("SELECT {} FROM {}", targets.join(", "), quote_ident(&name));
        let out = self.executor.run(&sql, vec![(name.clone(), df)])?;
        debug!(target: "conflux::datahub", "{}: updated table {}", self.name, name);
        self.insert_table(&name, out);
        Ok(())
    }

    fn run_delete(&self, d: &Delete) -> Result<()> {
        let (name, df) = self.table_or_err(&d.table)?;
        let out = match &d.where_clause {
            Some(cond) => {
                let sql = format!("SELECT * FROM {} WHERE NOT COALESCE({}, FALSE)", quote_ident(&name), cond);
                self.executor.run(&sql, vec![(name.clone(), df)])?
            }
            None => df.clear(),
        };
        self.insert_table(&name, out);
        Ok(())
    }

    fn run_insert(&self, ins: &Insert) -> Result<()> {
        let (name, existing) = self.table_or_err(&ins.table)?;
        let columns = if ins.columns.is_empty() { frame_column_names(&existing) } else { ins.columns.clone() };
        let new_df = rows_to_frame(&columns, &[], &ins.values)?;
        self.insert_table(&name, append_aligned(existing, new_df)?);
        Ok(())
    }
}

/// Vertically append `new` to `existing`, aligning by column name; missing columns on
/// either side are null-filled and dtypes follow the first non-null type seen.
pub(crate) fn append_aligned(existing: DataFrame, new: DataFrame) -> Result<DataFrame> {
    if existing.width() == 0 { return Ok(new); }
    if new.width() == 0 { return Ok(existing); }
    let frames = [existing, new];
    let mut all_cols: Vec<String> = Vec::new();
    let mut col_types: HashMap<String, DataType> = HashMap::new();
    for df in &frames {
        for c in df.get_columns() {
            let n = c.name().to_string();
            if !all_cols.contains(&n) { all_cols.push(n.clone()); }
            if c.dtype() != &DataType::Null && !col_types.contains_key(&n) { col_types.insert(n, c.dtype().clone()); }
        }
    }
    let mut aligned: Vec<DataFrame> = Vec::with_capacity(2);
    for df in frames {
        let mut cols: Vec<polars::prelude::Column> = Vec::with_capacity(all_cols.len());
        for n in &all_cols {
            let dtype = col_types.get(n).cloned().unwrap_or(DataType::Null);
            let s = match df.column(n.as_str()) {
                Ok(c) => c.as_materialized_series().cast(&dtype)?,
                Err(_) => Series::new_null(n.as_str().into(), df.height()).cast(&dtype)?,
            };
            cols.push(s.into());
        }
        aligned.push(DataFrame::new(cols)?);
    }
    let mut acc = aligned.remove(0);
    acc.vstack_mut(&aligned[0])?;
    Ok(acc)
}

impl DataNode for MemoryDataNode {
    fn name(&self) -> &str { &self.name }

    fn query(&self, query: NodeQuery<'_>, _session: &Session) -> Result<(Vec<Record>, Vec<ColumnInfo>)> {
        let df = match query {
            NodeQuery::Native(sql) => self.executor.run(sql, self.all_tables())?,
            NodeQuery::Statement(Statement::Select(q)) => self.run_select(q)?,
            NodeQuery::Statement(Statement::Update(u)) => { self.run_update(u)?; DataFrame::empty() }
            NodeQuery::Statement(Statement::Delete(d)) => { self.run_delete(d)?; DataFrame::empty() }
            NodeQuery::Statement(Statement::Insert(i)) => { self.run_insert(i)?; DataFrame::empty() }
        };
        let columns = df.get_columns().iter()
            .map(|c| ColumnInfo { name: c.name().to_string(), dtype: Some(c.dtype().clone()) })
            .collect();
        Ok((frame_to_records(&df)?, columns))
    }

    fn get_table_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table(table).map(|df| frame_column_names(&df)).unwrap_or_default())
    }

    fn supports_create_table(&self) -> bool { true }

    fn create_table(&self, table: &Identifier, data: &ResultSet, is_replace: bool, is_create: bool) -> Result<()> {
        let new_df = data.to_df()?;
        let existing = self.resolve_name(table.last());
        match existing {
            Some(name) if !is_replace && !is_create => {
                let old = self.tables.read().get(&name).cloned().unwrap_or_default();
                self.insert_table(&name, append_aligned(old, new_df)?);
            }
            Some(_) if is_create && !is_replace => {
                return Err(AppError::logic(format!("Table '{}' already exists", table.joined())).into());
            }
            Some(name) => self.insert_table(&name, new_df),
            None => self.insert_table(table.last(), new_df),
        }
        debug!(target: "conflux::datahub", "{}: wrote {} rows to {}", self.name, data.len(), table.joined());
        Ok(())
    }
}

/// Catalog over named nodes (lookups are case-insensitive) and registered predictors.
#[derive(Default)]
pub struct MemoryHub {
    nodes: RwLock<HashMap<String, Arc<dyn DataNode>>>,
    predictors: RwLock<Vec<PredictorMetadata>>,
}

impl MemoryHub {
    pub fn new() -> Self { Self::default() }

    pub fn add_node(&self, node: Arc<dyn DataNode>) {
        self.nodes.write().insert(node.name().to_lowercase(), node);
    }

    pub fn add_predictor(&self, meta: PredictorMetadata) {
        let mut preds = self.predictors.write();
        preds.retain(|p| !(p.name == meta.name && p.project.eq_ignore_ascii_case(&meta.project)));
        preds.push(meta);
    }
}

impl DataHub for MemoryHub {
    fn get(&self, name: &str) -> Option<Arc<dyn DataNode>> {
        self.nodes.read().get(&name.to_lowercase()).cloned()
    }

    fn predictor_metadata(&self, project: &str, name: &str) -> Option<PredictorMetadata> {
        self.predictors.read().iter()
            .find(|p| p.name == name && p.project.eq_ignore_ascii_case(project))
            .cloned()
    }
}
