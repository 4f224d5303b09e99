//! The application call: one request/response exchange.

use crate::application::Application;
use crate::content::OutgoingContent;
use crate::events::EventDefinition;
use crate::value::{AnyValue, ApplicationReceiveRequest, TypeInfo};
use bytes::Bytes;
use conveyor_core::{Attributes, CallId, PipelineError, PipelineResult};
use http::header::HeaderMap;
use http::{Method, StatusCode, Uri, Version};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// The request side of a call.
#[derive(Debug)]
pub struct ApplicationRequest {
    head: http::request::Parts,
    body: Option<Bytes>,
}

impl ApplicationRequest {
    pub(crate) fn new(request: http::Request<Bytes>) -> Self {
        let (head, body) = request.into_parts();
        Self {
            head,
            body: Some(body),
        }
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Returns the HTTP version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.head.version
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the request extensions.
    #[must_use]
    pub const fn extensions(&self) -> &http::Extensions {
        &self.head.extensions
    }

    /// Returns `true` once the body has been received.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    fn take_body(&mut self) -> PipelineResult<Bytes> {
        self.body.take().ok_or(PipelineError::RequestAlreadyConsumed)
    }
}

/// The response side of a call.
#[derive(Debug, Default)]
pub struct ApplicationResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    content: Option<OutgoingContent>,
    response_type: Option<TypeInfo>,
    committed: bool,
}

impl ApplicationResponse {
    /// Returns the response status, if one was set or committed.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Sets the status used when the rendered content carries none.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Returns the response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the committed content.
    #[must_use]
    pub const fn content(&self) -> Option<&OutgoingContent> {
        self.content.as_ref()
    }

    /// Returns the type of the value passed to `respond`.
    #[must_use]
    pub const fn response_type(&self) -> Option<TypeInfo> {
        self.response_type
    }

    /// Returns `true` once content has been committed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    /// Commits rendered content. A response is committed at most once.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ResponseAlreadySent`] if content was already
    /// committed.
    pub fn commit(&mut self, content: OutgoingContent) -> PipelineResult<()> {
        if self.committed {
            return Err(PipelineError::ResponseAlreadySent);
        }
        content.apply_headers(&mut self.headers);
        self.status = Some(content.status().or(self.status).unwrap_or(StatusCode::OK));
        self.content = Some(content);
        self.committed = true;
        Ok(())
    }

    /// Converts the response into an `http::Response` for the transport.
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        let body = self
            .content
            .map(|content| content.into_parts().3)
            .unwrap_or_default();
        let mut response = http::Response::new(body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::NOT_FOUND);
        *response.headers_mut() = self.headers;
        response
    }
}

/// One request/response exchange flowing through the application pipelines.
pub struct ApplicationCall {
    id: CallId,
    application: Arc<Application>,
    request: ApplicationRequest,
    response: ApplicationResponse,
    attributes: Attributes,
    cancellation: CancellationToken,
}

impl ApplicationCall {
    /// Creates a call for `request`.
    #[must_use]
    pub fn new(
        application: Arc<Application>,
        request: http::Request<Bytes>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            id: CallId::new(),
            application,
            request: ApplicationRequest::new(request),
            response: ApplicationResponse::default(),
            attributes: Attributes::new(),
            cancellation,
        }
    }

    /// Returns the call id.
    #[must_use]
    pub const fn id(&self) -> CallId {
        self.id
    }

    /// Returns the application handling this call.
    #[must_use]
    pub fn application(&self) -> &Application {
        &self.application
    }

    /// Returns the request.
    #[must_use]
    pub const fn request(&self) -> &ApplicationRequest {
        &self.request
    }

    /// Returns the response.
    #[must_use]
    pub const fn response(&self) -> &ApplicationResponse {
        &self.response
    }

    /// Returns the response mutably.
    pub fn response_mut(&mut self) -> &mut ApplicationResponse {
        &mut self.response
    }

    /// Returns the call attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the call attributes mutably.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Returns the cancellation token of this call.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Raises an event on the application monitor.
    pub fn raise<T: 'static>(&self, definition: &EventDefinition<T>, value: &T) {
        self.application.monitor().raise(definition, value);
    }

    /// Receives the request body as `T` through the receive pipeline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::RequestAlreadyConsumed`] if the body was already received
    /// - [`PipelineError::CannotTransformContent`] if no transform produced a `T`
    /// - any error raised by a receive interceptor
    pub async fn receive<T: Send + Sync + 'static>(&mut self) -> PipelineResult<T> {
        let body = self.request.take_body()?;
        let subject = ApplicationReceiveRequest::new(TypeInfo::of::<T>(), AnyValue::new(body));
        trace!(call_id = %self.id, requested = std::any::type_name::<T>(), "Receiving request body");

        let application = Arc::clone(&self.application);
        let cancellation = self.cancellation.clone();
        let outcome = application
            .receive_pipeline()
            .execute_with_cancellation(self, subject, cancellation)
            .await?;

        outcome
            .into_subject()
            .value
            .downcast::<T>()
            .map_err(|value| {
                PipelineError::cannot_transform(format!(
                    "{} from {}",
                    std::any::type_name::<T>(),
                    value.type_name()
                ))
            })
    }

    /// Sends `value` as the response through the send pipeline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ResponseAlreadySent`] if a response was already committed
    /// - [`PipelineError::UnsupportedResponseType`] if nothing rendered `value`
    /// - any error raised by a send interceptor
    pub async fn respond<T: Send + Sync + 'static>(&mut self, value: T) -> PipelineResult<()> {
        if self.response.is_committed() {
            return Err(PipelineError::ResponseAlreadySent);
        }
        let subject = AnyValue::flatten(value);
        self.response.response_type = Some(subject.type_info());
        trace!(call_id = %self.id, value = subject.type_name(), "Sending response");

        let application = Arc::clone(&self.application);
        let cancellation = self.cancellation.clone();
        application
            .send_pipeline()
            .execute_with_cancellation(self, subject, cancellation)
            .await?;
        Ok(())
    }

    /// Consumes the call, returning its response.
    #[must_use]
    pub fn into_response(self) -> ApplicationResponse {
        self.response
    }
}

impl std::fmt::Debug for ApplicationCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationCall")
            .field("id", &self.id)
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("response", &self.response)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
