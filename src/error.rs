//! Unified error model for the execution core.
//! Step executors raise `anyhow` errors carrying one of these kinds somewhere in their chain;
//! the outer `execute` boundary classifies the chain back into an `AppError` so the caller
//! can map it to MySQL error codes or HTTP statuses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Invalid plan or internal contract violation (bad step reference, unsupported reduce, missing metadata).
    #[error("{code}: {message}")]
    Logic { code: String, message: String },
    /// A feature the executor does not implement (sub-select in filter, join without condition, node lacking create).
    #[error("{code}: {message}")]
    NotSupported { code: String, message: String },
    /// A referenced column is absent from the data it was looked up in.
    #[error("{code}: {message}")]
    KeyColumn { code: String, message: String },
    /// Caller-supplied arguments are inconsistent (row width mismatch, missing update fields).
    #[error("{code}: {message}")]
    WrongArguments { code: String, message: String },
    /// Anything unclassified, usually a backend or polars failure.
    #[error("{code}: {message}")]
    Unknown { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Logic { code, .. }
            | AppError::NotSupported { code, .. }
            | AppError::KeyColumn { code, .. }
            | AppError::WrongArguments { code, .. }
            | AppError::Unknown { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Logic { message, .. }
            | AppError::NotSupported { message, .. }
            | AppError::KeyColumn { message, .. }
            | AppError::WrongArguments { message, .. }
            | AppError::Unknown { message, .. } => message.as_str(),
        }
    }

    pub fn logic<S: Into<String>>(msg: S) -> Self { AppError::Logic { code: "logic_error".into(), message: msg.into() } }
    pub fn not_supported<S: Into<String>>(msg: S) -> Self { AppError::NotSupported { code: "not_supported".into(), message: msg.into() } }
    pub fn key_column<S: Into<String>>(msg: S) -> Self { AppError::KeyColumn { code: "key_column".into(), message: msg.into() } }
    pub fn wrong_arguments<S: Into<String>>(msg: S) -> Self { AppError::WrongArguments { code: "wrong_arguments".into(), message: msg.into() } }
    pub fn unknown<S: Into<String>>(msg: S) -> Self { AppError::Unknown { code: "unknown_error".into(), message: msg.into() } }

    /// Walk an anyhow chain and return the first `AppError` kind found, keeping the full
    /// contextual message (`error in join step: ...: Column 'x' not found`). Foreign errors map to `Unknown`.
    pub fn classify(err: &anyhow::Error) -> AppError {
        let message = format!("{:#}", err);
        match err.chain().find_map(|e| e.downcast_ref::<AppError>()) {
            Some(AppError::Logic { code, .. }) => AppError::Logic { code: code.clone(), message },
            Some(AppError::NotSupported { code, .. }) => AppError::NotSupported { code: code.clone(), message },
            Some(AppError::KeyColumn { code, .. }) => AppError::KeyColumn { code: code.clone(), message },
            Some(AppError::WrongArguments { code, .. }) => AppError::WrongArguments { code: code.clone(), message },
            Some(AppError::Unknown { code, .. }) => AppError::Unknown { code: code.clone(), message },
            None => AppError::Unknown { code: "unknown_error".into(), message },
        }
    }

    /// MySQL error number surfaced to clients.
    pub fn mysql_code(&self) -> u16 {
        match self {
            AppError::Logic { .. } => 1149,          // ER_SYNTAX_ERROR
            AppError::NotSupported { .. } => 1235,   // ER_NOT_SUPPORTED_YET
            AppError::KeyColumn { .. } => 1072,      // ER_KEY_COLUMN_DOES_NOT_EXITS
            AppError::WrongArguments { .. } => 1210, // ER_WRONG_ARGUMENTS
            AppError::Unknown { .. } => 1105,        // ER_UNKNOWN_ERROR
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Logic { .. } => 400,
            AppError::NotSupported { .. } => 501,
            AppError::KeyColumn { .. } => 404,
            AppError::WrongArguments { .. } => 400,
            AppError::Unknown { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self { AppError::classify(&err) }
}

impl From<polars::error::PolarsError> for AppError {
    fn from(err: polars::error::PolarsError) -> Self { AppError::unknown(err.to_string()) }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
