//! Test error types.

use conveyor_core::PipelineError;
use thiserror::Error;

/// Errors that can occur while driving a test application.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// Header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Response body is not what the caller asked for.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Application setup failed.
    #[error("Setup error: {0}")]
    Setup(#[from] PipelineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TestError::InvalidHeader("bad name".to_string());
        assert_eq!(err.to_string(), "Invalid header: bad name");

        let err = TestError::from(PipelineError::duplicate_plugin("Auth"));
        assert_eq!(err.to_string(), "Setup error: Plugin already installed: Auth");
    }
}
