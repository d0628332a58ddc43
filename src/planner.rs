//! Planner boundary: the step set and the plan container the executor consumes.

pub mod plan;
pub mod steps;

pub use plan::{split_outer_query, ColumnSpec, Planner, QueryPlan};
pub use steps::{ApplyPredictorStep, FetchDataframeStep, Params, PredictorRef, Step, StepRef};
