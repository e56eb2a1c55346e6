//! Shared error types for the conformance suite driver

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid case index: {input}")]
    InvalidCaseIndex { input: String },

    #[error("Invalid agent identity: {input}")]
    InvalidAgent { input: String },

    #[error("Invalid endpoint {host}:{port}: {message}")]
    InvalidEndpoint { host: String, port: u16, message: String },

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

pub type SharedResult<T> = Result<T, SharedError>;
