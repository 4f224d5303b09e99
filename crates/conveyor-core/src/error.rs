//! Error types for Conveyor.
//!
//! This module provides [`PipelineError`], the single error type that flows
//! through `proceed()` frames, plugin installation and attribute access.
//!
//! # Error classes
//!
//! | Class | Variants | Handling |
//! |---|---|---|
//! | Registry misuse | `UnknownPhase`, `DuplicatePhase`, `DuplicatePlugin` | Fail fast at registration |
//! | Lookup | `AttributeNotFound`, `MissingPlugin` | Recoverable, use the `_or_none` accessors |
//! | Call protocol | `RequestAlreadyConsumed`, `ResponseAlreadySent`, `UnexpectedSubject`, ... | Propagate through the chain |
//! | Application | `Application` | Raised by interceptors, may be caught by wrapping interceptors |
//! | Cancellation | `Cancelled` | Unwinds like any other error |

use http::StatusCode;
use thiserror::Error;

/// Result type alias using [`PipelineError`].
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Standard error type for Conveyor.
///
/// # Example
///
/// ```
/// use conveyor_core::PipelineError;
///
/// let err = PipelineError::unknown_phase("Render");
/// assert!(err.is_programmer_error());
/// assert_eq!(err.to_string(), "Unknown phase: Render");
/// ```
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A phase was referenced that is not registered in the pipeline.
    #[error("Unknown phase: {phase}")]
    UnknownPhase {
        /// Name of the missing phase.
        phase: String,
    },

    /// A phase name was registered twice.
    #[error("Duplicate phase: {phase}")]
    DuplicatePhase {
        /// Name of the phase.
        phase: String,
    },

    /// An attribute was read or taken but is not present.
    #[error("Attribute not found: {key}")]
    AttributeNotFound {
        /// Name of the attribute key.
        key: String,
    },

    /// A plugin with the same key is already installed.
    #[error("Plugin already installed: {name}")]
    DuplicatePlugin {
        /// Plugin key.
        name: String,
    },

    /// A plugin was looked up but is not installed.
    #[error("Plugin not installed: {name}")]
    MissingPlugin {
        /// Plugin key.
        name: String,
    },

    /// The pipeline subject does not have the type an interceptor requires.
    #[error("Unexpected subject: expected {expected}, found {actual}")]
    UnexpectedSubject {
        /// Type the interceptor expected.
        expected: &'static str,
        /// Type that was found.
        actual: String,
    },

    /// No interceptor could convert the request body into the requested type.
    #[error("Cannot transform request body into {target}")]
    CannotTransformContent {
        /// The requested type.
        target: String,
    },

    /// The request body was already received.
    #[error("Request body has already been received")]
    RequestAlreadyConsumed,

    /// The response was already committed.
    #[error("Response has already been sent")]
    ResponseAlreadySent,

    /// No interceptor rendered the response value into outgoing content.
    #[error("Unsupported response type: {type_name}")]
    UnsupportedResponseType {
        /// Name of the response value type.
        type_name: String,
    },

    /// The traversal was cancelled before it completed.
    #[error("Call cancelled")]
    Cancelled,

    /// An error raised by application code inside an interceptor.
    #[error(transparent)]
    Application(#[from] anyhow::Error),
}

impl PipelineError {
    /// Creates an unknown phase error.
    #[must_use]
    pub fn unknown_phase(phase: impl Into<String>) -> Self {
        Self::UnknownPhase {
            phase: phase.into(),
        }
    }

    /// Creates a duplicate phase error.
    #[must_use]
    pub fn duplicate_phase(phase: impl Into<String>) -> Self {
        Self::DuplicatePhase {
            phase: phase.into(),
        }
    }

    /// Creates an attribute not found error.
    #[must_use]
    pub fn attribute_not_found(key: impl Into<String>) -> Self {
        Self::AttributeNotFound { key: key.into() }
    }

    /// Creates a duplicate plugin error.
    #[must_use]
    pub fn duplicate_plugin(name: impl Into<String>) -> Self {
        Self::DuplicatePlugin { name: name.into() }
    }

    /// Creates a missing plugin error.
    #[must_use]
    pub fn missing_plugin(name: impl Into<String>) -> Self {
        Self::MissingPlugin { name: name.into() }
    }

    /// Creates an unexpected subject error.
    #[must_use]
    pub fn unexpected_subject(expected: &'static str, actual: impl Into<String>) -> Self {
        Self::UnexpectedSubject {
            expected,
            actual: actual.into(),
        }
    }

    /// Creates a content transformation error.
    #[must_use]
    pub fn cannot_transform(target: impl Into<String>) -> Self {
        Self::CannotTransformContent {
            target: target.into(),
        }
    }

    /// Creates an unsupported response type error.
    #[must_use]
    pub fn unsupported_response(type_name: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            type_name: type_name.into(),
        }
    }

    /// Wraps an application error message.
    #[must_use]
    pub fn application(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Application(anyhow::Error::msg(message))
    }

    /// Returns `true` for registry misuse that should fail fast at startup.
    #[must_use]
    pub const fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPhase { .. } | Self::DuplicatePhase { .. } | Self::DuplicatePlugin { .. }
        )
    }

    /// Returns `true` if this error came from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the application error if it has the given type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Application(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns the HTTP status code a transport should use when this error
    /// terminates a call before a response was committed.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::CannotTransformContent { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a short machine-readable code used in logs and metrics.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownPhase { .. } => "unknown_phase",
            Self::DuplicatePhase { .. } => "duplicate_phase",
            Self::AttributeNotFound { .. } => "attribute_not_found",
            Self::DuplicatePlugin { .. } => "duplicate_plugin",
            Self::MissingPlugin { .. } => "missing_plugin",
            Self::UnexpectedSubject { .. } => "unexpected_subject",
            Self::CannotTransformContent { .. } => "cannot_transform",
            Self::RequestAlreadyConsumed => "request_already_consumed",
            Self::ResponseAlreadySent => "response_already_sent",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::Cancelled => "cancelled",
            Self::Application(_) => "application",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("teapot")]
    struct Teapot;

    #[test]
    fn test_constructors_format_messages() {
        assert_eq!(
            PipelineError::duplicate_phase("Call").to_string(),
            "Duplicate phase: Call"
        );
        assert_eq!(
            PipelineError::attribute_not_found("start").to_string(),
            "Attribute not found: start"
        );
        assert_eq!(
            PipelineError::unexpected_subject("OutgoingContent", "String").to_string(),
            "Unexpected subject: expected OutgoingContent, found String"
        );
    }

    #[test]
    fn test_programmer_errors() {
        assert!(PipelineError::unknown_phase("x").is_programmer_error());
        assert!(PipelineError::duplicate_plugin("x").is_programmer_error());
        assert!(!PipelineError::attribute_not_found("x").is_programmer_error());
        assert!(!PipelineError::Cancelled.is_programmer_error());
    }

    #[test]
    fn test_application_error_downcast() {
        let err = PipelineError::from(anyhow::Error::new(Teapot));
        assert!(err.downcast_ref::<Teapot>().is_some());
        assert_eq!(err.to_string(), "teapot");
        assert_eq!(err.code(), "application");
        assert!(PipelineError::Cancelled.downcast_ref::<Teapot>().is_none());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PipelineError::cannot_transform("User").status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            PipelineError::Cancelled.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            PipelineError::application("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
