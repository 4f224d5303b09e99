//! In-memory test application.

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;
use bytes::Bytes;
use conveyor_config::ConveyorConfig;
use conveyor_core::PipelineResult;
use conveyor_pipeline::CancellationToken;
use conveyor_server::{Application, ApplicationEngine, CallOutcome};
use http::Method;
use serde::Serialize;

/// An application behind a started engine, driven without a network.
///
/// # Example
///
/// ```ignore
/// use conveyor_server::CallPhase;
/// use conveyor_test::TestApplication;
///
/// let app = TestApplication::build(|application| {
///     application.call_pipeline_mut().intercept(&CallPhase::CALL, |ctx| {
///         Box::pin(async move { ctx.context_mut().respond("pong").await })
///     })
/// })?;
///
/// app.get("/ping").send().await.assert_status(StatusCode::OK).assert_body_eq("pong");
/// ```
#[must_use]
pub struct TestApplication {
    engine: ApplicationEngine,
    default_headers: Vec<(String, String)>,
}

impl TestApplication {
    /// Wraps `application` in an engine and starts it.
    pub fn new(application: Application) -> Self {
        let engine = ApplicationEngine::new(application);
        engine.start();
        Self {
            engine,
            default_headers: Vec::new(),
        }
    }

    /// Creates an application with the default configuration and lets
    /// `configure` install plugins and interceptors.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Setup` if creating or configuring the
    /// application fails.
    pub fn build<F>(configure: F) -> Result<Self, TestError>
    where
        F: FnOnce(&mut Application) -> PipelineResult<()>,
    {
        Self::build_with_config(ConveyorConfig::default(), configure)
    }

    /// Like [`build`](Self::build), with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Setup` if creating or configuring the
    /// application fails.
    pub fn build_with_config<F>(config: ConveyorConfig, configure: F) -> Result<Self, TestError>
    where
        F: FnOnce(&mut Application) -> PipelineResult<()>,
    {
        let mut application = Application::with_config(config)?;
        configure(&mut application)?;
        Ok(Self::new(application))
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the application.
    #[must_use]
    pub fn application(&self) -> &Application {
        self.engine.application()
    }

    /// Returns the engine.
    #[must_use]
    pub const fn engine(&self) -> &ApplicationEngine {
        &self.engine
    }

    /// Creates a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestCall<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestCall<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestCall<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestCall<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates a request with a custom method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestCall<'_> {
        TestCall::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Sends a prepared request and returns the raw engine outcome.
    pub async fn handle(&self, request: http::Request<Bytes>) -> CallOutcome {
        self.engine.handle(request).await
    }

    /// Stops the engine.
    pub async fn stop(&self) -> bool {
        self.engine.stop().await
    }
}

impl std::fmt::Debug for TestApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestApplication")
            .field("state", &self.engine.state())
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// A request bound to a test application.
#[must_use]
#[derive(Debug)]
pub struct TestCall<'a> {
    application: &'a TestApplication,
    builder: TestRequestBuilder,
    cancellation: CancellationToken,
}

impl<'a> TestCall<'a> {
    fn new(application: &'a TestApplication, mut builder: TestRequestBuilder) -> Self {
        for (name, value) in &application.default_headers {
            builder = builder.header(name, value);
        }
        Self {
            application,
            builder,
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a plain-text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.builder = self.builder.text(text);
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Runs the call under `token`; cancelling it stops the call before its
    /// next interceptor.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("invalid test request: {e}"),
        }
    }

    /// Sends the request.
    ///
    /// A call that fails inside the application still yields a response;
    /// see [`TestResponse::error`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be built.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        let outcome = self
            .application
            .engine
            .handle_with_cancellation(request, self.cancellation)
            .await;
        Ok(TestResponse::from_outcome(outcome))
    }
}
