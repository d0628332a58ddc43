//! Closed set of plan steps. The executor dispatches on the variant only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Identifier, Insert, Join, Select, Update};
use crate::result_set::{Record, Value};

/// Predictor call parameters (`USING ...`).
pub type Params = BTreeMap<String, Value>;

/// Reference to an earlier step's result by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepRef {
    pub step_num: usize,
}

impl StepRef {
    pub fn new(step_num: usize) -> Self { Self { step_num } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorRef {
    /// Model path inside the project; a numeric last part is a version (`model.3`).
    pub name: Identifier,
    #[serde(default)]
    pub alias: Option<Identifier>,
}

impl PredictorRef {
    pub fn named(name: &str) -> Self { Self { name: Identifier::from_dotted(name), alias: None } }

    pub fn model_name(&self) -> &str { self.name.first() }

    pub fn version(&self) -> Option<u32> {
        if self.name.parts.len() > 1 { self.name.last().parse::<u32>().ok() } else { None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchDataframeStep {
    pub integration: String,
    #[serde(default)]
    pub query: Option<Select>,
    /// Native query text sent verbatim.
    #[serde(default)]
    pub raw_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyPredictorStep {
    pub namespace: String,
    pub predictor: PredictorRef,
    pub dataframe: StepRef,
    #[serde(default)]
    pub params: Params,
    /// Time predicate applied to time-series model output.
    #[serde(default)]
    pub output_time_filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    GetPredictorColumns { namespace: String, predictor: PredictorRef },
    GetTableColumns { namespace: String, table: String },
    FetchDataframe(FetchDataframeStep),
    Union { left: StepRef, right: StepRef, unique: bool },
    MapReduce {
        values: StepRef,
        reduce: String,
        /// Template run once per driving row; `step` itself is the variant tag.
        #[serde(rename = "substep")]
        step: Box<Step>,
    },
    MultipleSteps { steps: Vec<Step>, reduce: String },
    ApplyPredictorRow {
        namespace: String,
        predictor: PredictorRef,
        row_dict: Vec<(String, Expr)>,
        #[serde(default)]
        params: Params,
    },
    ApplyPredictor(ApplyPredictorStep),
    ApplyTimeseriesPredictor(ApplyPredictorStep),
    Join { left: StepRef, right: StepRef, query: Join },
    Filter { dataframe: StepRef, query: Expr },
    LimitOffset {
        dataframe: StepRef,
        #[serde(default)]
        limit: Option<Expr>,
        #[serde(default)]
        offset: Option<Expr>,
    },
    Project { dataframe: StepRef, columns: Vec<Expr> },
    GroupBy { dataframe: StepRef, targets: Vec<Expr>, columns: Vec<Expr> },
    SubSelect {
        dataframe: StepRef,
        query: Select,
        #[serde(default)]
        table_name: Option<String>,
        #[serde(default = "default_true")]
        add_absent_cols: bool,
    },
    SaveToTable {
        table: Identifier,
        #[serde(default)]
        dataframe: Option<StepRef>,
        #[serde(default)]
        query: Option<Insert>,
        #[serde(default)]
        is_replace: bool,
    },
    InsertToTable {
        table: Identifier,
        #[serde(default)]
        dataframe: Option<StepRef>,
        #[serde(default)]
        query: Option<Insert>,
    },
    UpdateToTable {
        table: Identifier,
        #[serde(default)]
        dataframe: Option<StepRef>,
        update_command: Update,
    },
    Delete {
        table: Identifier,
        #[serde(default)]
        where_clause: Option<Expr>,
    },
    Data { data: Vec<Record> },
}

fn default_true() -> bool { true }

impl Step {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Step::GetPredictorColumns { .. } => "get predictor columns",
            Step::GetTableColumns { .. } => "get table columns",
            Step::FetchDataframe(_) => "fetch dataframe",
            Step::Union { .. } => "union",
            Step::MapReduce { .. } => "map reduce",
            Step::MultipleSteps { .. } => "multiple steps",
            Step::ApplyPredictorRow { .. } => "apply predictor row",
            Step::ApplyPredictor(_) => "apply predictor",
            Step::ApplyTimeseriesPredictor(_) => "apply timeseries predictor",
            Step::Join { .. } => "join",
            Step::Filter { .. } => "filter",
            Step::LimitOffset { .. } => "limit offset",
            Step::Project { .. } => "project",
            Step::GroupBy { .. } => "group by",
            Step::SubSelect { .. } => "sub select",
            Step::SaveToTable { .. } => "save to table",
            Step::InsertToTable { .. } => "insert to table",
            Step::UpdateToTable { .. } => "update to table",
            Step::Delete { .. } => "delete",
            Step::Data { .. } => "data",
        }
    }

    /// Predictors this step (or its nested steps) invokes, as `(project, predictor)`.
    pub fn predictors(&self) -> Vec<(&str, &PredictorRef)> {
        match self {
            Step::ApplyPredictorRow { namespace, predictor, .. } => vec![(namespace.as_str(), predictor)],
            Step::ApplyPredictor(s) | Step::ApplyTimeseriesPredictor(s) => vec![(s.namespace.as_str(), &s.predictor)],
            Step::MapReduce { step, .. } => step.predictors(),
            Step::MultipleSteps { steps, .. } => steps.iter().flat_map(|s| s.predictors()).collect(),
            _ => Vec::new(),
        }
    }
}
