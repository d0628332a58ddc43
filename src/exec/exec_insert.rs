//! exec_insert
//! -----------
//! SaveToTable / InsertToTable: hand a step result (or literal INSERT values) to a
//! node that can create tables. Service columns never leave the engine.

use anyhow::Result;
use tracing::info;

use super::context::ExecContext;
use crate::ast::{Identifier, Insert};
use crate::error::AppError;
use crate::planner::StepRef;
use crate::result_set::{Column, ResultSet, FORECAST_OFFSET_COLUMN, ROW_ID_COLUMN};
use crate::session::Session;

const PREDICTOR_PREFIX: &str = "predictor.";

fn insert_values(ins: &Insert, fallback_cols: impl FnOnce() -> Result<Vec<String>>) -> Result<ResultSet> {
    let names = if ins.columns.is_empty() { fallback_cols()? } else { ins.columns.clone() };
    let mut data = ResultSet::new();
    for n in &names { data.add_column(Column::new(n.as_str()).into_ref(), None); }
    data.add_raw_values(ins.values.clone())?;
    Ok(data)
}

/// Drop service columns, columns outside the declared output and repeated aliases.
fn prepare_for_write(data: &mut ResultSet, declared: Option<&[String]>) -> Result<()> {
    let mut seen: Vec<String> = Vec::new();
    for col in data.columns().to_vec() {
        let service = col.name == ROW_ID_COLUMN || col.name == FORECAST_OFFSET_COLUMN;
        let undeclared = declared.is_some_and(|names| {
            !col.name.starts_with(PREDICTOR_PREFIX) && !names.iter().any(|n| *n == col.name)
        });
        if service || undeclared || seen.contains(&col.alias) {
            data.del_column(&col)?;
        } else {
            seen.push(col.alias.clone());
        }
    }
    Ok(())
}

pub fn run_save(
    ctx: &ExecContext,
    session: &Session,
    table: &Identifier,
    dataframe: Option<&StepRef>,
    query: Option<&Insert>,
    is_replace: bool,
    is_create: bool,
) -> Result<ResultSet> {
    let (integration, table_name) = ctx.split_integration(table)?;
    let node = session.datahub.get_or_err(&integration)?;
    if !node.supports_create_table() {
        return Err(AppError::not_supported(format!("Integration {} does not support table creation", integration)).into());
    }

    let mut data = match (dataframe, query) {
        (Some(r), _) => ctx.step_data(r)?.clone(),
        (None, Some(ins)) => insert_values(ins, || node.get_table_columns(&table_name.joined()))?,
        (None, None) => return Err(AppError::logic("Data not found for insert").into()),
    };

    let declared: Option<Vec<String>> = ctx.columns_list.as_ref().map(|cols| cols.iter().map(|c| c.name.clone()).collect());
    prepare_for_write(&mut data, declared.as_deref())?;

    info!(target: "conflux::exec", "writing {} rows to {}.{} (replace={}, create={})",
        data.len(), integration, table_name.joined(), is_replace, is_create);
    node.create_table(&table_name, &data, is_replace, is_create)?;
    Ok(ResultSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_set::{TableIdentity, Value};

    #[test]
    fn write_strips_service_and_repeated_columns() {
        let t = TableIdentity::new(Some("db"), Some("t"), None);
        let mut data = ResultSet::with_columns(vec![
            Column::new("a").with_table(&t).into_ref(),
            Column::new(ROW_ID_COLUMN).with_table(&t).into_ref(),
            Column::new("a").with_table(&t).into_ref(),
            Column::new("predictor.p").into_ref(),
            Column::new("b").into_ref(),
        ]);
        data.add_record_raw(vec![Value::Int(1), Value::Int(0), Value::Int(2), Value::Int(3), Value::Int(4)]).unwrap();
        assert_eq!(data.len(), 1);
        prepare_for_write(&mut data, Some(&["a".to_string()])).unwrap();
        assert_eq!(data.column_names(), vec!["a", "predictor.p"]);
        assert_eq!(data.rows()[0], vec![Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn insert_values_use_declared_columns() {
        let ins = Insert { table: Identifier::from_dotted("db.t"), columns: vec!["x".into()], values: vec![vec![Value::Int(1)]] };
        let data = insert_values(&ins, || Ok(vec![])).unwrap();
        assert_eq!(data.column_names(), vec!["x"]);
        let bad = Insert { values: vec![vec![Value::Int(1), Value::Int(2)]], ..ins };
        assert!(insert_values(&bad, || Ok(vec![])).is_err());
    }
}
