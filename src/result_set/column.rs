//! Column descriptors. A column is an entity: two columns with equal names are
//! still distinct, so result sets hold them behind `Arc` and compare by pointer.

use std::sync::Arc;

use polars::prelude::DataType;

pub type ColumnRef = Arc<Column>;

/// `(database, table_name, table_alias)` as reported by `ResultSet::get_tables`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    pub database: Option<String>,
    pub table_name: Option<String>,
    pub table_alias: Option<String>,
}

impl TableIdentity {
    pub fn new<S: Into<String>>(database: Option<S>, table_name: Option<S>, table_alias: Option<S>) -> Self {
        let table_name = table_name.map(Into::into);
        let table_alias = table_alias.map(Into::into).or_else(|| table_name.clone());
        Self { database: database.map(Into::into), table_name, table_alias }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub alias: String,
    pub table_name: Option<String>,
    pub table_alias: Option<String>,
    pub database: Option<String>,
    pub dtype: Option<DataType>,
    pub flags: Option<u32>,
    pub charset: Option<u32>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { alias: name.clone(), name, table_name: None, table_alias: None, database: None, dtype: None, flags: None, charset: None }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Attach table identity; the alias falls back to the table name.
    pub fn with_table(mut self, t: &TableIdentity) -> Self {
        self.database = t.database.clone();
        self.table_name = t.table_name.clone();
        self.table_alias = t.table_alias.clone().or_else(|| t.table_name.clone());
        self
    }

    pub fn with_type(mut self, dtype: Option<DataType>) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn table(&self) -> TableIdentity {
        TableIdentity { database: self.database.clone(), table_name: self.table_name.clone(), table_alias: self.table_alias.clone() }
    }

    /// Flattened name used across the local executor boundary: `{prefix}_{table_alias}_{alias}`.
    pub fn get_hash_name(&self, prefix: &str) -> String {
        let table = self.table_alias.as_deref().or(self.table_name.as_deref()).unwrap_or("");
        format!("{}_{}_{}", prefix, table, self.alias)
    }

    pub fn into_ref(self) -> ColumnRef { Arc::new(self) }
}
