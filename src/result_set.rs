//! In-memory tabular value passed between steps.
//!
//! Rows are stored positionally (`rows[i][j]` belongs to `columns[j]`) and every row
//! always has exactly as many values as there are columns. Columns are shared
//! `Arc<Column>` handles so identity survives renames and round trips through the
//! local executor (see `to_df_cols` / `from_df_cols`).

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use anyhow::Result;
use polars::prelude::{DataFrame, DataType};

use crate::error::AppError;

pub mod column;
pub mod df_convert;
pub mod record;
pub mod value;

pub use column::{Column, ColumnRef, TableIdentity};
pub use record::Record;
pub use value::Value;

/// Service column correlating predictor output back to its input rows.
pub const ROW_ID_COLUMN: &str = "__mindsdb_row_id";
/// Per-row forecast start hint handed to time-series predictors.
pub const FORECAST_OFFSET_COLUMN: &str = "__mdb_forecast_offset";

#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<ColumnRef>,
    rows: Vec<Vec<Value>>,
    pub is_prediction: bool,
}

impl ResultSet {
    pub fn new() -> Self { Self::default() }

    pub fn with_columns(columns: Vec<ColumnRef>) -> Self { Self { columns, rows: Vec::new(), is_prediction: false } }

    pub fn columns(&self) -> &[ColumnRef] { &self.columns }

    /// Display names (aliases) in column order.
    pub fn column_names(&self) -> Vec<String> { self.columns.iter().map(|c| c.alias.clone()).collect() }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn rows(&self) -> &[Vec<Value>] { &self.rows }

    pub fn into_rows(self) -> Vec<Vec<Value>> { self.rows }

    /// Append a column. Missing values (or all of them, when `values` is `None`) are null.
    pub fn add_column(&mut self, col: impl Into<ColumnRef>, values: Option<Vec<Value>>) -> ColumnRef {
        let col = col.into();
        self.columns.push(col.clone());
        let mut values = values.unwrap_or_default().into_iter();
        for row in self.rows.iter_mut() {
            row.push(values.next().unwrap_or(Value::Null));
        }
        col
    }

    pub fn get_col_index(&self, col: &ColumnRef) -> Option<usize> {
        self.columns.iter().position(|c| Arc::ptr_eq(c, col))
    }

    /// Remove a column by identity, dropping the same slot from every row.
    pub fn del_column(&mut self, col: &ColumnRef) -> Result<()> {
        let idx = self.get_col_index(col)
            .ok_or_else(|| AppError::wrong_arguments(format!("Column is not found: {}", col.alias)))?;
        self.columns.remove(idx);
        for row in self.rows.iter_mut() { row.remove(idx); }
        Ok(())
    }

    /// Case-insensitive lookup on alias and/or table alias; all matches in column order.
    pub fn find_columns(&self, alias: Option<&str>, table_alias: Option<&str>) -> Vec<ColumnRef> {
        let alias = alias.map(str::to_lowercase);
        let table_alias = table_alias.map(str::to_lowercase);
        self.columns.iter()
            .filter(|c| alias.as_ref().is_none_or(|a| c.alias.to_lowercase() == *a))
            .filter(|c| table_alias.as_ref().is_none_or(|t| c.table_alias.as_ref().is_some_and(|ct| ct.to_lowercase() == *t)))
            .cloned()
            .collect()
    }

    pub fn column_values(&self, idx: usize) -> Vec<Value> {
        self.rows.iter().map(|r| r.get(idx).cloned().unwrap_or(Value::Null)).collect()
    }

    /// Overwrite one column's values; rows beyond `values` become null.
    pub fn set_column_values(&mut self, idx: usize, values: Vec<Value>) {
        let mut values = values.into_iter();
        for row in self.rows.iter_mut() {
            if let Some(slot) = row.get_mut(idx) { *slot = values.next().unwrap_or(Value::Null); }
        }
    }

    /// Deep-copy a column (new identity) with its values into `other`.
    pub fn copy_column_to(&self, col: &ColumnRef, other: &mut ResultSet) -> Result<ColumnRef> {
        let idx = self.get_col_index(col)
            .ok_or_else(|| AppError::wrong_arguments(format!("Column is not found: {}", col.alias)))?;
        let copy = Column::clone(col).into_ref();
        other.add_column(copy.clone(), Some(self.column_values(idx)));
        Ok(copy)
    }

    /// Project name-keyed rows onto the current columns (by alias); absent names become
    /// null, extra keys are ignored.
    pub fn add_records(&mut self, records: &[Record]) {
        let names = self.column_names();
        self.rows.reserve(records.len());
        for rec in records {
            self.rows.push(names.iter().map(|n| rec.get(n).cloned().unwrap_or(Value::Null)).collect());
        }
    }

    pub fn add_record_raw(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(AppError::wrong_arguments(format!(
                "Record length mismatch columns length: {} != {}", row.len(), self.columns.len()
            )).into());
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn add_raw_values(&mut self, rows: Vec<Vec<Value>>) -> Result<()> {
        for row in rows { self.add_record_raw(row)?; }
        Ok(())
    }

    /// Rows as name-keyed records. Repeated aliases collapse, the later value winning.
    pub fn get_records(&self) -> Vec<Record> {
        let names = self.column_names();
        self.rows.iter().map(|row| names.iter().cloned().zip(row.iter().cloned()).collect()).collect()
    }

    /// Distinct table identities in first-seen column order.
    pub fn get_tables(&self) -> Vec<TableIdentity> {
        let mut out: Vec<TableIdentity> = Vec::new();
        for c in &self.columns {
            let t = c.table();
            if !out.contains(&t) { out.push(t); }
        }
        out
    }

    /// Keep rows `[offset, offset + limit)`, clamped at the bounds.
    pub fn slice(&mut self, offset: usize, limit: Option<usize>) {
        let start = offset.min(self.rows.len());
        let end = match limit {
            Some(l) => start.saturating_add(l).min(self.rows.len()),
            None => self.rows.len(),
        };
        self.rows = self.rows.drain(start..end).collect();
    }

    pub fn replace_nan_with_null(&mut self) {
        for v in self.rows.iter_mut().flatten() {
            if matches!(v, Value::Float(f) if f.is_nan()) { *v = Value::Null; }
        }
    }

    /// Frame keyed by display names.
    pub fn to_df(&self) -> Result<DataFrame> {
        let hints: Vec<Option<DataType>> = self.columns.iter().map(|c| c.dtype.clone()).collect();
        df_convert::rows_to_frame(&self.column_names(), &hints, &self.rows)
    }

    /// Frame keyed by collision-proof hashed names, plus the map back to the columns.
    pub fn to_df_cols(&self, prefix: &str) -> Result<(DataFrame, HashMap<String, ColumnRef>)> {
        let names = df_convert::unique_names(&self.columns.iter().map(|c| c.get_hash_name(prefix)).collect::<Vec<_>>());
        let hints: Vec<Option<DataType>> = self.columns.iter().map(|c| c.dtype.clone()).collect();
        let map: HashMap<String, ColumnRef> = names.iter().cloned().zip(self.columns.iter().cloned()).collect();
        let df = df_convert::rows_to_frame(&names, &hints, &self.rows)?;
        Ok((df, map))
    }

    /// Wrap an external frame as columns of table `table`.
    pub fn from_df(df: &DataFrame, table: &TableIdentity) -> Result<Self> {
        let columns: Vec<ColumnRef> = df.get_columns().iter()
            .map(|c| Column::new(c.name().to_string()).with_table(table).with_type(Some(c.dtype().clone())).into_ref())
            .collect();
        let rows = df_convert::frame_rows(df)?;
        Ok(Self { columns, rows, is_prediction: false })
    }

    /// Rebuild from a frame produced by the local executor. Names found in `col_names`
    /// reuse the original column object; unknown names fail when `strict`, else become
    /// fresh untabled columns.
    pub fn from_df_cols(df: &DataFrame, col_names: &HashMap<String, ColumnRef>, strict: bool) -> Result<Self> {
        let mut columns: Vec<ColumnRef> = Vec::with_capacity(df.width());
        for c in df.get_columns() {
            let name = c.name().as_str();
            match col_names.get(name) {
                Some(col) => columns.push(col.clone()),
                None if strict => return Err(AppError::key_column(format!("Column not found: {}", name)).into()),
                None => columns.push(Column::new(name).with_type(Some(c.dtype().clone())).into_ref()),
            }
        }
        let rows = df_convert::frame_rows(df)?;
        Ok(Self { columns, rows, is_prediction: false })
    }

    /// Column set plus name-keyed rows, tagged with one table identity.
    pub fn from_records(names: &[String], records: &[Record], table: &TableIdentity) -> Self {
        let columns = names.iter().map(|n| Column::new(n.as_str()).with_table(table).into_ref()).collect();
        let mut rs = Self::with_columns(columns);
        rs.add_records(records);
        rs
    }
}

impl Display for ResultSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ResultSet({} columns, {} rows{})", self.columns.len(), self.rows.len(),
            if self.is_prediction { ", prediction" } else { "" })?;
        let header: Vec<String> = self.columns.iter().map(|c| match &c.table_alias {
            Some(t) => format!("{}.{}", t, c.alias),
            None => c.alias.clone(),
        }).collect();
        writeln!(f, "{}", header.join(" | "))?;
        for row in self.rows.iter().take(20) {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        if self.rows.len() > 20 { writeln!(f, "... ({} more)", self.rows.len() - 20)?; }
        Ok(())
    }
}
