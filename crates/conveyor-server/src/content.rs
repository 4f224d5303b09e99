//! Outgoing response content.

use bytes::Bytes;
use conveyor_core::{PipelineError, PipelineResult};
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;

/// Content type for UTF-8 text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Content type for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Content type for raw binary bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A rendered response body with its status and headers.
///
/// The send pipeline renders the handler's value into this type; the
/// terminal engine interceptor commits it to the call's response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingContent {
    status: Option<StatusCode>,
    content_type: Option<HeaderValue>,
    headers: HeaderMap,
    body: Bytes,
}

impl OutgoingContent {
    /// Creates content from a raw body.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Creates UTF-8 text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into()).with_content_type(HeaderValue::from_static(TEXT_PLAIN))
    }

    /// Creates binary content.
    pub fn binary(body: impl Into<Bytes>) -> Self {
        Self::new(body).with_content_type(HeaderValue::from_static(OCTET_STREAM))
    }

    /// Creates JSON content.
    ///
    /// # Errors
    ///
    /// Returns an application error if `value` cannot be serialized.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> PipelineResult<Self> {
        let body = serde_json::to_vec(value).map_err(anyhow::Error::from)?;
        Ok(Self::new(body).with_content_type(HeaderValue::from_static(APPLICATION_JSON)))
    }

    /// Creates empty content carrying only a status.
    #[must_use]
    pub fn status_only(status: StatusCode) -> Self {
        Self::default().with_status(status)
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns the status, if one was set.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the content type, if one was set.
    #[must_use]
    pub const fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the extra headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Returns the body length in bytes.
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CannotTransformContent`] if the body is not
    /// valid UTF-8.
    pub fn body_text(&self) -> PipelineResult<&str> {
        std::str::from_utf8(&self.body).map_err(|_| PipelineError::cannot_transform("str"))
    }

    /// Splits the content into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Option<StatusCode>, Option<HeaderValue>, HeaderMap, Bytes) {
        (self.status, self.content_type, self.headers, self.body)
    }

    /// Writes the content type and extra headers into `headers`.
    pub(crate) fn apply_headers(&self, headers: &mut HeaderMap) {
        if let Some(content_type) = &self.content_type {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }
        for (name, value) in &self.headers {
            headers.append(name.clone(), value.clone());
        }
    }
}
