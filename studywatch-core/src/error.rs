//! Error types for studywatch-core

use thiserror::Error;

/// Main error type for the studywatch-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure (connection, timeout, non-JSON server error)
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with `{"status": false, "msg": ...}`
    #[error("API error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Api {
        /// HTTP status code when the response was not 2xx
        status: Option<u16>,
        message: String,
    },

    /// The envelope or its payload did not have the expected shape
    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

impl Error {
    /// Whether a later attempt at the same request may succeed.
    ///
    /// Transport failures, 5xx answers and malformed payloads are all
    /// considered transient; a `status: false` envelope with a 4xx code is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(_) | Error::Malformed { .. } => true,
            Error::Api { status, .. } => status.map_or(true, |s| s >= 500),
            Error::Io(_) | Error::Config(_) => false,
        }
    }
}

/// Result type alias for studywatch-core
pub type Result<T> = std::result::Result<T, Error>;
