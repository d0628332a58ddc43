//! exec_predict
//! ------------
//! ApplyPredictorRow / ApplyPredictor / ApplyTimeseriesPredictor.
//! Input rows get a shared `__mindsdb_row_id` so predictions can be joined back;
//! predictor calls go through the prediction cache unless it is switched off.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use polars::prelude::{DataFrame, DataType};
use regex::Regex;
use tracing::{debug, info};

use super::context::ExecContext;
use super::ts_filter::apply_ts_filter;
use super::StepExecutor;
use crate::ast::Expr;
use crate::cache::{predict_cache_key, PredictCache};
use crate::error::AppError;
use crate::planner::{ApplyPredictorStep, Params, PredictorRef, StepRef};
use crate::result_set::df_convert::{frame_to_records, records_to_frame};
use crate::result_set::{Column, Record, ResultSet, TableIdentity, Value, FORECAST_OFFSET_COLUMN, ROW_ID_COLUMN};
use crate::session::Session;

static AFTER_LATEST_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)>\s*LATEST\b").ok());
static AT_LATEST_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)=\s*LATEST\b").ok());

/// Forecast start implied by the query text: `> LATEST` is 1, `= LATEST` is 0.
pub(crate) fn forecast_offset(query_text: &str) -> Option<i64> {
    let hit = |re: &Lazy<Option<Regex>>| re.as_ref().is_some_and(|r| r.is_match(query_text));
    if hit(&AFTER_LATEST_RE) { Some(1) } else if hit(&AT_LATEST_RE) { Some(0) } else { None }
}

fn predictor_table(models_db: &str, predictor: &PredictorRef) -> TableIdentity {
    let name = predictor.name.joined();
    let alias = predictor.alias.as_ref().map(|a| a.joined()).unwrap_or_else(|| name.clone());
    TableIdentity { database: Some(models_db.to_string()), table_name: Some(name), table_alias: Some(alias) }
}

fn frame_dtypes(df: &DataFrame) -> HashMap<String, DataType> {
    df.get_columns().iter().map(|c| (c.name().to_string(), c.dtype().clone())).collect()
}

fn prediction_result(
    rows: &[Record],
    fallback_cols: impl FnOnce() -> Result<Vec<String>>,
    dtypes: &HashMap<String, DataType>,
    table: &TableIdentity,
) -> Result<ResultSet> {
    let names: Vec<String> = match rows.first() {
        Some(r) => r.keys().map(str::to_string).collect(),
        None => fallback_cols()?,
    };
    let mut data = ResultSet::new();
    data.is_prediction = true;
    for n in &names {
        data.add_column(Column::new(n.as_str()).with_table(table).with_type(dtypes.get(n).cloned()).into_ref(), None);
    }
    data.add_records(rows);
    Ok(data)
}

fn row_value(ctx: &ExecContext, e: &Expr) -> Result<Value> {
    match e {
        Expr::Constant(c) => Ok(c.value.clone()),
        Expr::Parameter { step_num } => {
            let data = ctx.step_data(&StepRef::new(*step_num))?;
            let mut values: Vec<Value> = data.rows().iter().map(|r| r.first().cloned().unwrap_or_default()).collect();
            if values.len() == 1 { Ok(values.remove(0)) } else { Ok(Value::List(values)) }
        }
        other => Err(AppError::logic(format!("Unsupported value in predictor row: {}", other)).into()),
    }
}

pub fn run_predictor_row(
    ctx: &ExecContext,
    session: &Session,
    namespace: &str,
    predictor: &PredictorRef,
    row_dict: &[(String, Expr)],
    params: &Params,
) -> Result<ResultSet> {
    let mut where_data = Record::with_capacity(row_dict.len());
    for (k, e) in row_dict { where_data.insert(k.as_str(), row_value(ctx, e)?); }

    let node = session.datahub.get_or_err(namespace)?;
    let model = predictor.model_name();
    let df = node.predict(model, std::slice::from_ref(&where_data), predictor.version(), params)?;
    let dtypes = frame_dtypes(&df);
    let mut predictions = frame_to_records(&df)?;
    for row in predictions.iter_mut() {
        for (k, v) in where_data.iter() {
            if !row.contains_key(k) { row.insert(k, v.clone()); }
        }
    }
    let table = predictor_table(&ctx.models_database, predictor);
    prediction_result(&predictions, || node.get_table_columns(model), &dtypes, &table)
}

pub fn run_apply_predictor(ex: &StepExecutor, ctx: &mut ExecContext, session: &Session, step: &ApplyPredictorStep) -> Result<ResultSet> {
    let n = ctx.step_data(&step.dataframe)?.len();
    let row_ids = ctx.next_row_ids(n);
    let where_data = {
        let data = ctx.step_data_mut(&step.dataframe)?;
        // one id range shared by every table so the collapsed records stay aligned
        for table in data.get_tables() {
            data.add_column(Column::new(ROW_ID_COLUMN).with_table(&table).into_ref(), Some(row_ids.clone()));
        }
        data.get_records()
    };

    let model = step.predictor.model_name();
    let meta = ctx.find_predictor(&step.namespace, model)?;
    let mut params = step.params.clone();
    let mut where_data = where_data;
    if meta.timeseries {
        let offset = forecast_offset(&ctx.query_text);
        if offset.is_none() { params.insert("force_ts_infer".to_string(), Value::Bool(true)); }
        let offset = offset.map(Value::Int).unwrap_or(Value::Null);
        for row in where_data.iter_mut() {
            if !row.contains_key(FORECAST_OFFSET_COLUMN) { row.insert(FORECAST_OFFSET_COLUMN, offset.clone()); }
        }
    }

    let table = predictor_table(&ctx.models_database, &step.predictor);
    let node = session.datahub.get_or_err(&step.namespace)?;

    if where_data.is_empty() {
        let mut columns = node.get_table_columns(model)?;
        columns.push(ROW_ID_COLUMN.to_string());
        return prediction_result(&[], || Ok(columns), &HashMap::new(), &table);
    }

    let version = step.predictor.version();
    let mut dtypes: HashMap<String, DataType> = HashMap::new();
    let predict = |dtypes: &mut HashMap<String, DataType>| -> Result<Vec<Record>> {
        let df = node.predict(model, &where_data, version, &params)?;
        *dtypes = frame_dtypes(&df);
        frame_to_records(&df)
    };
    let rows: Arc<Vec<Record>> = if ex.config().predictor_cache && session.predictor_cache {
        let key = predict_cache_key(model, meta.id, version, &where_data);
        let cache = session.cache.clone().unwrap_or_else(PredictCache::global);
        let (rows, hit) = cache.get_or_compute(&key, || predict(&mut dtypes))?;
        debug!(target: "conflux::exec", "predict cache {} for {}", if hit { "hit" } else { "miss" }, model);
        // cached entries keep only records; recover column types from the values
        if hit { dtypes = frame_dtypes(&records_to_frame(rows.as_slice())?); }
        rows
    } else {
        Arc::new(predict(&mut dtypes)?)
    };
    info!(target: "conflux::exec", "predictor {} returned {} rows for {} inputs", model, rows.len(), where_data.len());

    let rows = if meta.timeseries {
        apply_ts_filter(rows.to_vec(), &where_data, step.output_time_filter.as_ref(), &meta)
    } else {
        rows.to_vec()
    };
    prediction_result(&rows, || node.get_table_columns(model), &dtypes, &table)
}
