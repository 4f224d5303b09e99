//! Application plugins: a configuration factory plus a body that registers
//! handlers against the call, receive and send pipelines.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Default)]
//! struct HeaderConfig {
//!     value: String,
//! }
//!
//! let plugin = create_application_plugin("ServerHeader", HeaderConfig::default, |builder| {
//!     builder.on_call_respond_after_transform(|mut ctx| {
//!         Box::pin(async move {
//!             let value = ctx.plugin_config().value.clone();
//!             ctx.transform_body(|_, content| async move {
//!                 Ok(content.with_header(SERVER, HeaderValue::try_from(value).map_err(anyhow::Error::from)?))
//!             })
//!             .await
//!         })
//!     });
//! });
//!
//! application.install(&plugin, |config| config.value = "conveyor".into())?;
//! ```

use crate::application::{Application, ApplicationEnvironment};
use crate::call::ApplicationCall;
use crate::contexts::{
    OnCallContext, OnCallReceiveContext, OnCallRespondAfterTransformContext, OnCallRespondContext,
};
use crate::hooks::Hook;
use crate::phases::{CallPhase, ReceivePhase, SendPhase};
use crate::value::{AnyValue, ApplicationReceiveRequest};
use conveyor_core::PipelineResult;
use conveyor_pipeline::{BoxFuture, Interceptor, PipelineContext};
use std::fmt;
use std::sync::Arc;

/// A registration deferred until the whole plugin body has run.
pub(crate) type Registration = Box<dyn FnOnce(&mut Application) -> PipelineResult<()> + Send>;

/// A named, configurable plugin.
pub struct ApplicationPlugin<Config> {
    key: &'static str,
    create_configuration: Arc<dyn Fn() -> Config + Send + Sync>,
    body: Arc<dyn Fn(&mut PluginBuilder<Config>) + Send + Sync>,
}

impl<Config> ApplicationPlugin<Config> {
    /// Returns the plugin key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    pub(crate) fn create_configuration(&self) -> Config {
        (self.create_configuration)()
    }

    pub(crate) fn build(&self, builder: &mut PluginBuilder<Config>) {
        (self.body)(builder);
    }
}

impl<Config> Clone for ApplicationPlugin<Config> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            create_configuration: Arc::clone(&self.create_configuration),
            body: Arc::clone(&self.body),
        }
    }
}

impl<Config> fmt::Debug for ApplicationPlugin<Config> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationPlugin")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Creates a plugin from a configuration factory and a body.
///
/// The body runs once per installation with a [`PluginBuilder`] whose
/// configuration is already frozen.
pub fn create_application_plugin<Config, C, B>(
    key: &'static str,
    create_configuration: C,
    body: B,
) -> ApplicationPlugin<Config>
where
    C: Fn() -> Config + Send + Sync + 'static,
    B: Fn(&mut PluginBuilder<Config>) + Send + Sync + 'static,
{
    ApplicationPlugin {
        key,
        create_configuration: Arc::new(create_configuration),
        body: Arc::new(body),
    }
}

/// Creates a plugin without configuration.
pub fn create_plugin<B>(key: &'static str, body: B) -> ApplicationPlugin<()>
where
    B: Fn(&mut PluginBuilder<()>) + Send + Sync + 'static,
{
    create_application_plugin(key, || (), body)
}

/// An installed plugin: its key and frozen configuration.
///
/// The configuration is shared with the plugin's handlers. A configuration
/// type holding interior mutability (a `Mutex`, an atomic) therefore shares
/// live state with every call the plugin handles.
pub struct PluginInstance<Config> {
    key: &'static str,
    config: Arc<Config>,
}

impl<Config> PluginInstance<Config> {
    pub(crate) const fn new(key: &'static str, config: Arc<Config>) -> Self {
        Self { key, config }
    }

    /// Returns the plugin key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the shared configuration.
    #[must_use]
    pub fn shared_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

impl<Config: fmt::Debug> fmt::Debug for PluginInstance<Config> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish()
    }
}

/// Collects the registrations of one plugin installation.
pub struct PluginBuilder<Config> {
    key: &'static str,
    config: Arc<Config>,
    environment: ApplicationEnvironment,
    registrations: Vec<Registration>,
}

impl<Config> PluginBuilder<Config> {
    pub(crate) fn new(
        key: &'static str,
        config: Arc<Config>,
        environment: ApplicationEnvironment,
    ) -> Self {
        Self {
            key,
            config,
            environment,
            registrations: Vec::new(),
        }
    }

    pub(crate) fn into_registrations(self) -> Vec<Registration> {
        self.registrations
    }

    /// Returns the plugin key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Returns the frozen plugin configuration.
    #[must_use]
    pub fn plugin_config(&self) -> &Config {
        &self.config
    }

    /// Returns the application environment.
    #[must_use]
    pub const fn environment(&self) -> &ApplicationEnvironment {
        &self.environment
    }
}

impl<Config: Send + Sync + 'static> PluginBuilder<Config> {
    /// Runs `handler` for every call, in the call pipeline's `Plugins` phase.
    pub fn on_call<F>(&mut self, handler: F)
    where
        F: for<'a, 'c> Fn(OnCallContext<'a, 'c, Config>) -> BoxFuture<'a, PipelineResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let interceptor = self.stage(handler);
        self.registrations
            .push(Box::new(move |application: &mut Application| {
                application
                    .call_pipeline_mut()
                    .intercept_with(&CallPhase::PLUGINS, interceptor)
            }));
    }

    /// Runs `handler` on every `receive`, in the receive pipeline's
    /// `Transform` phase.
    pub fn on_call_receive<F>(&mut self, handler: F)
    where
        F: for<'a, 'c> Fn(OnCallReceiveContext<'a, 'c, Config>) -> BoxFuture<'a, PipelineResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let interceptor = self.stage(handler);
        self.registrations
            .push(Box::new(move |application: &mut Application| {
                application
                    .receive_pipeline_mut()
                    .intercept_with(&ReceivePhase::TRANSFORM, interceptor)
            }));
    }

    /// Runs `handler` on every `respond`, in the send pipeline's
    /// `Transform` phase.
    pub fn on_call_respond<F>(&mut self, handler: F)
    where
        F: for<'a, 'c> Fn(OnCallRespondContext<'a, 'c, Config>) -> BoxFuture<'a, PipelineResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let interceptor = self.stage(handler);
        self.registrations
            .push(Box::new(move |application: &mut Application| {
                application
                    .send_pipeline_mut()
                    .intercept_with(&SendPhase::TRANSFORM, interceptor)
            }));
    }

    /// Runs `handler` on every `respond` after rendering, in the send
    /// pipeline's `After` phase.
    pub fn on_call_respond_after_transform<F>(&mut self, handler: F)
    where
        F: for<'a, 'c> Fn(
                OnCallRespondAfterTransformContext<'a, 'c, Config>,
            ) -> BoxFuture<'a, PipelineResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let interceptor = AfterTransformInterceptor(self.stage(handler));
        self.registrations
            .push(Box::new(move |application: &mut Application| {
                application
                    .send_pipeline_mut()
                    .intercept_with(&SendPhase::AFTER, interceptor)
            }));
    }

    /// Installs `hook` with `handler`.
    pub fn on<H>(&mut self, hook: H, handler: H::Handler)
    where
        H: Hook + Send + 'static,
        H::Handler: Send + 'static,
    {
        self.registrations
            .push(Box::new(move |application: &mut Application| {
                hook.install(application, handler)
            }));
    }

    fn stage<F>(&self, handler: F) -> StageInterceptor<Config, F> {
        StageInterceptor {
            plugin: self.key,
            config: Arc::clone(&self.config),
            handler,
        }
    }
}

impl<Config> fmt::Debug for PluginBuilder<Config> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginBuilder")
            .field("key", &self.key)
            .field("registrations", &self.registrations.len())
            .finish_non_exhaustive()
    }
}

/// A plugin handler bound to its frozen configuration.
struct StageInterceptor<Config, F> {
    plugin: &'static str,
    config: Arc<Config>,
    handler: F,
}

impl<Config, F> Interceptor<(), ApplicationCall> for StageInterceptor<Config, F>
where
    Config: Send + Sync + 'static,
    F: for<'a, 'c> Fn(OnCallContext<'a, 'c, Config>) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.plugin
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, (), ApplicationCall>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        (self.handler)(OnCallContext::new(ctx, &self.config))
    }
}

impl<Config, F> Interceptor<ApplicationReceiveRequest, ApplicationCall> for StageInterceptor<Config, F>
where
    Config: Send + Sync + 'static,
    F: for<'a, 'c> Fn(OnCallReceiveContext<'a, 'c, Config>) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.plugin
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, ApplicationReceiveRequest, ApplicationCall>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        (self.handler)(OnCallReceiveContext::new(ctx, &self.config))
    }
}

impl<Config, F> Interceptor<AnyValue, ApplicationCall> for StageInterceptor<Config, F>
where
    Config: Send + Sync + 'static,
    F: for<'a, 'c> Fn(OnCallRespondContext<'a, 'c, Config>) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.plugin
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, AnyValue, ApplicationCall>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        (self.handler)(OnCallRespondContext::new(ctx, &self.config))
    }
}

/// The after-transform stage shares its subject type with the respond stage.
struct AfterTransformInterceptor<Config, F>(StageInterceptor<Config, F>);

impl<Config, F> Interceptor<AnyValue, ApplicationCall> for AfterTransformInterceptor<Config, F>
where
    Config: Send + Sync + 'static,
    F: for<'a, 'c> Fn(
            OnCallRespondAfterTransformContext<'a, 'c, Config>,
        ) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.0.plugin
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, AnyValue, ApplicationCall>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        (self.0.handler)(OnCallRespondAfterTransformContext::new(ctx, &self.0.config))
    }
}
