//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use conveyor_core::{CallId, PipelineError};
use conveyor_server::{CallOutcome, CallStatus};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

/// The response of one call, together with how the call ended.
#[derive(Debug)]
pub struct TestResponse {
    call_id: CallId,
    call_status: CallStatus,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Creates a test response from an engine outcome.
    #[must_use]
    pub fn from_outcome(outcome: CallOutcome) -> Self {
        let (call, call_status) = outcome.into_parts();
        let call_id = call.id();
        let (parts, body) = call.into_response().into_http().into_parts();

        Self {
            call_id,
            call_status,
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// Returns the ID of the call that produced this response.
    #[must_use]
    pub const fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Returns how the call ended.
    #[must_use]
    pub const fn call_status(&self) -> &CallStatus {
        &self.call_status
    }

    /// Returns the error the call failed with, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&PipelineError> {
        self.call_status.error()
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    ///
    /// # Errors
    ///
    /// Returns `TestError::BodyRead` if the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str, TestError> {
        std::str::from_utf8(&self.body).map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Json` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    // Assertion methods

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    #[track_caller]
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}",
            expected, self.status
        );
        self
    }

    /// Asserts that the call ran to completion without being finished early
    /// or failing.
    ///
    /// # Panics
    ///
    /// Panics if the call did not complete.
    #[track_caller]
    pub fn assert_completed(&self) -> &Self {
        assert!(
            matches!(self.call_status, CallStatus::Completed),
            "Expected completed call, got {:?}",
            self.call_status
        );
        self
    }

    /// Asserts that the call failed with an error of the given code.
    ///
    /// # Panics
    ///
    /// Panics if the call did not fail, or failed with another code.
    #[track_caller]
    pub fn assert_failed_with(&self, code: &str) -> &Self {
        match self.error() {
            Some(err) => assert_eq!(err.code(), code, "Expected error {code}, got {err}"),
            None => panic!("Expected failed call, got {:?}", self.call_status),
        }
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    #[track_caller]
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self.header_str(name);
        assert_eq!(
            actual,
            Some(expected),
            "Expected header {name}: {expected}, got {actual:?}"
        );
        self
    }

    /// Asserts that the body equals the expected text.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't match.
    #[track_caller]
    pub fn assert_body_eq(&self, expected: impl AsRef<str>) -> &Self {
        assert_eq!(
            String::from_utf8_lossy(&self.body),
            expected.as_ref(),
            "Body mismatch"
        );
        self
    }

    /// Asserts that the body is JSON equal to `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or doesn't match.
    #[track_caller]
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        match self.json::<serde_json::Value>() {
            Ok(actual) => assert_eq!(&actual, expected, "JSON body mismatch"),
            Err(e) => panic!("Body is not JSON: {e}"),
        }
        self
    }
}
