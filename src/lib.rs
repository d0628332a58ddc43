//! conflux: execution core of a federated SQL engine. A planner hands over an
//! ordered list of steps; the executor runs them against registered data nodes
//! and model projects and returns one result set.

pub mod ast;
pub mod cache;
pub mod config;
pub mod datahub;
pub mod error;
pub mod exec;
pub mod planner;
pub mod process_mark;
pub mod result_set;
pub mod session;

pub use error::{AppError, AppResult};
pub use exec::{execute, QueryOutput, StepExecutor};
pub use planner::{Planner, QueryPlan, Step};
pub use result_set::{Column, ColumnRef, Record, ResultSet, Value};
pub use session::Session;

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
