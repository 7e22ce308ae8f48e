//! Error types for Delve.

use thiserror::Error;

/// HTTP status the model API uses to signal an exhausted quota.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// Errors that can occur while running the research pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The topic was empty or whitespace only
    #[error("Topic must not be empty")]
    EmptyTopic,

    /// The model API answered with a non-success status
    #[error("Model API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure while writing the report
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The streaming response broke off or could not be decoded
    #[error("Stream error: {0}")]
    Stream(String),

    /// The model produced no usable text
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// The coordinator's structured output did not match the plan shape
    #[error("Invalid research plan: {0}")]
    InvalidPlan(String),

    /// No API key or access token could be found
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is the API's rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == RATE_LIMIT_STATUS,
            Error::Http(e) => e.status().is_some_and(|s| s.as_u16() == RATE_LIMIT_STATUS),
            _ => false,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type for Delve operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        let err = Error::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED".to_string(),
        };
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_other_status_is_not_rate_limit() {
        let err = Error::Api {
            status: 500,
            message: "internal".to_string(),
        };
        assert!(!err.is_rate_limited());
        assert!(!Error::EmptyResponse.is_rate_limited());
    }
}
