//! Collaborator interfaces: data nodes (integrations and model projects) and the
//! catalog that resolves them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use polars::prelude::{DataFrame, DataType};
use serde::{Deserialize, Serialize};

use crate::ast::{Identifier, Statement};
use crate::error::AppError;
use crate::planner::Params;
use crate::result_set::{Record, ResultSet};
use crate::session::Session;

pub mod memory;
pub mod project;
pub mod seed;

pub use memory::{MemoryDataNode, MemoryHub};
pub use project::{MemoryProjectNode, ModelFn};
pub use seed::HubSeed;

/// Column descriptor returned alongside backend rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: Option<DataType>,
}

impl ColumnInfo {
    pub fn named(name: &str) -> Self { Self { name: name.to_string(), dtype: None } }
}

pub enum NodeQuery<'a> {
    Statement(&'a Statement),
    /// Backend-native text sent verbatim.
    Native(&'a str),
}

pub trait DataNode: Send + Sync {
    fn name(&self) -> &str;

    fn query(&self, query: NodeQuery<'_>, session: &Session) -> Result<(Vec<Record>, Vec<ColumnInfo>)>;

    fn get_table_columns(&self, table: &str) -> Result<Vec<String>>;

    fn supports_create_table(&self) -> bool { false }

    fn create_table(&self, table: &Identifier, _data: &ResultSet, _is_replace: bool, _is_create: bool) -> Result<()> {
        Err(AppError::not_supported(format!("Table creation is not supported by '{}' (table {})", self.name(), table.joined())).into())
    }

    /// Run a model over rows; the returned frame carries the output dtypes.
    fn predict(&self, model: &str, _data: &[Record], _version: Option<u32>, _params: &Params) -> Result<DataFrame> {
        Err(AppError::not_supported(format!("'{}' cannot run model '{}'", self.name(), model)).into())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictorMetadata {
    pub name: String,
    pub project: String,
    pub id: i64,
    #[serde(default)]
    pub timeseries: bool,
    #[serde(default)]
    pub window: Option<u32>,
    #[serde(default)]
    pub horizon: Option<u32>,
    #[serde(default)]
    pub order_by_column: Option<String>,
    #[serde(default)]
    pub group_by_columns: Vec<String>,
    /// Declared semantic types per column (`integer`, `float`, `date`, `datetime`, ...).
    #[serde(default)]
    pub dtypes: HashMap<String, String>,
}

pub trait DataHub: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<dyn DataNode>>;

    fn predictor_metadata(&self, project: &str, name: &str) -> Option<PredictorMetadata>;

    fn get_or_err(&self, name: &str) -> Result<Arc<dyn DataNode>> {
        self.get(name).ok_or_else(|| AppError::logic(format!("Unknown integration: {}", name)).into())
    }
}
