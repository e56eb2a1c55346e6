//! Driver-specific error types

use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConformanceError {
    #[error("Connection to {uri} failed: {message}")]
    ConnectFailed { uri: String, message: String },

    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    TimedOut { waiting_for: &'static str, timeout: Duration },

    #[error("Case count unavailable: no message within {timeout:?}")]
    CountUnavailable { timeout: Duration },

    #[error("Malformed case count: {payload:?}")]
    MalformedCount { payload: String },

    #[error("Close of {uri} not confirmed within {timeout:?}")]
    CloseNotConfirmed { uri: String, timeout: Duration },

    #[error("Report update not confirmed within {timeout:?}")]
    ReportTimeout { timeout: Duration },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ConformanceError {
    pub fn connect_failed(uri: impl ToString, message: impl ToString) -> Self {
        Self::ConnectFailed {
            uri: uri.to_string(),
            message: message.to_string(),
        }
    }

    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }
}

pub type ConformanceResult<T> = Result<T, ConformanceError>;
