//! JSON seed for an in-memory hub: integrations with their tables, model projects
//! whose models append fixed output values to every input row.
//!
//! ```json
//! {
//!   "integrations": { "sales": { "orders": [ {"id": 1, "amount": 10.0} ] } },
//!   "projects": {
//!     "mindsdb": [ { "name": "price", "columns": ["amount", "predicted"], "outputs": {"predicted": 1.5} } ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use serde::Deserialize;
use tracing::debug;

use super::{MemoryDataNode, MemoryHub, MemoryProjectNode, ModelFn, PredictorMetadata};
use crate::planner::Params;
use crate::result_set::df_convert::{frame_to_records, records_to_frame};
use crate::result_set::{Record, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSeed {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Values written into every output row, overriding inputs of the same name.
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
    /// Metadata overrides; `name` and `project` are filled in from the seed.
    #[serde(default)]
    pub metadata: Option<PredictorMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubSeed {
    #[serde(default)]
    pub integrations: BTreeMap<String, BTreeMap<String, Vec<Record>>>,
    #[serde(default)]
    pub projects: BTreeMap<String, Vec<ModelSeed>>,
}

fn constant_model(outputs: BTreeMap<String, Value>) -> ModelFn {
    Arc::new(move |df: &DataFrame, _params: &Params| {
        let mut rows = frame_to_records(df)?;
        for r in rows.iter_mut() {
            for (k, v) in &outputs { r.insert(k.as_str(), v.clone()); }
        }
        records_to_frame(&rows)
    })
}

impl HubSeed {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing hub seed")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading hub seed {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn build(&self) -> Result<Arc<MemoryHub>> {
        let hub = Arc::new(MemoryHub::new());
        for (name, tables) in &self.integrations {
            let node = MemoryDataNode::new(name);
            for (table, rows) in tables {
                node.insert_records(table, rows)
                    .with_context(|| format!("loading table {}.{}", name, table))?;
            }
            debug!(target: "conflux::datahub", "seeded integration {} with {} tables", name, tables.len());
            hub.add_node(Arc::new(node));
        }
        let mut next_id = 1i64;
        for (project, models) in &self.projects {
            let node = MemoryProjectNode::new(project);
            for m in models {
                let cols: Vec<&str> = m.columns.iter().map(String::as_str).collect();
                node.add_model(&m.name, &cols, constant_model(m.outputs.clone()));
                let mut meta = m.metadata.clone().unwrap_or_default();
                meta.name = m.name.clone();
                meta.project = project.clone();
                if meta.id == 0 { meta.id = next_id; }
                next_id += 1;
                hub.add_predictor(meta);
            }
            hub.add_node(Arc::new(node));
        }
        Ok(hub)
    }
}
