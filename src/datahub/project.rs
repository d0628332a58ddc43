//! In-memory model project: named closures over frames standing in for predictors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use polars::prelude::DataFrame;
use tracing::debug;

use super::{ColumnInfo, DataNode, NodeQuery};
use crate::error::AppError;
use crate::planner::Params;
use crate::result_set::df_convert::records_to_frame;
use crate::result_set::Record;
use crate::session::Session;

pub type ModelFn = Arc<dyn Fn(&DataFrame, &Params) -> Result<DataFrame> + Send + Sync>;

struct Model {
    columns: Vec<String>,
    func: ModelFn,
    calls: AtomicUsize,
}

pub struct MemoryProjectNode {
    name: String,
    models: RwLock<HashMap<String, Arc<Model>>>,
}

impl MemoryProjectNode {
    pub fn new(name: &str) -> Self { Self { name: name.to_string(), models: RwLock::new(HashMap::new()) } }

    /// Register a model with its declared output columns.
    pub fn add_model(&self, model: &str, columns: &[&str], func: ModelFn) {
        let m = Model { columns: columns.iter().map(|c| c.to_string()).collect(), func, calls: AtomicUsize::new(0) };
        self.models.write().insert(model.to_string(), Arc::new(m));
    }

    /// Number of predict calls that reached the model.
    pub fn calls(&self, model: &str) -> usize {
        self.models.read().get(model).map(|m| m.calls.load(Ordering::SeqCst)).unwrap_or(0)
    }

    fn model(&self, model: &str) -> Result<Arc<Model>> {
        self.models.read().get(model).cloned()
            .ok_or_else(|| AppError::logic(format!("Model '{}' not found in project '{}'", model, self.name)).into())
    }
}

impl DataNode for MemoryProjectNode {
    fn name(&self) -> &str { &self.name }

    fn query(&self, _query: NodeQuery<'_>, _session: &Session) -> Result<(Vec<Record>, Vec<ColumnInfo>)> {
        Err(AppError::not_supported(format!("project '{}' does not answer queries", self.name)).into())
    }

    fn get_table_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.model(table)?.columns.clone())
    }

    fn predict(&self, model: &str, data: &[Record], version: Option<u32>, params: &Params) -> Result<DataFrame> {
        let m = self.model(model)?;
        m.calls.fetch_add(1, Ordering::SeqCst);
        debug!(target: "conflux::datahub", "{}: predict {} (version {:?}) over {} rows", self.name, model, version, data.len());
        let input = records_to_frame(data)?;
        (m.func)(&input, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{IntoLazy, col, lit};

    #[test]
    fn predict_counts_calls() {
        let p = MemoryProjectNode::new("mindsdb");
        p.add_model("double", &["x", "y"], Arc::new(|df: &DataFrame, _: &Params| {
            Ok(df.clone().lazy().with_column((col("x") * lit(2i64)).alias("y")).collect()?)
        }));
        let rows = vec![Record::from([("x", crate::result_set::Value::Int(2))])];
        let out = p.predict("double", &rows, None, &Params::new()).unwrap();
        assert_eq!(out.column("y").unwrap().i64().unwrap().get(0), Some(4));
        assert_eq!(p.calls("double"), 1);
        assert_eq!(p.get_table_columns("double").unwrap(), vec!["x", "y"]);
        assert!(p.predict("missing", &rows, None, &Params::new()).is_err());
    }
}
