//! The application: pipelines, monitor and installed plugins.

use crate::call::ApplicationCall;
use crate::events::Events;
use crate::phases::{CallPhase, ReceivePhase, SendPhase};
use crate::plugin::{ApplicationPlugin, PluginBuilder, PluginInstance};
use crate::transforms;
use crate::value::{AnyValue, ApplicationReceiveRequest};
use conveyor_config::ConveyorConfig;
use conveyor_core::{
    AttributeKey, Attributes, DuplicatePluginPolicy, PipelineError, PipelineResult,
};
use conveyor_pipeline::{Pipeline, PipelineBuilder};
use std::sync::Arc;
use tracing::{debug, warn};

/// The call pipeline: subject `()`, runs once per call.
pub type CallPipeline = Pipeline<(), ApplicationCall>;

/// The receive pipeline: transforms the request body into the requested type.
pub type ReceivePipeline = Pipeline<ApplicationReceiveRequest, ApplicationCall>;

/// The send pipeline: renders a response value into `OutgoingContent`.
pub type SendPipeline = Pipeline<AnyValue, ApplicationCall>;

/// Read-only environment shared with plugins.
#[derive(Debug, Clone, Default)]
pub struct ApplicationEnvironment {
    config: Arc<ConveyorConfig>,
}

impl ApplicationEnvironment {
    /// Creates an environment from a configuration.
    #[must_use]
    pub fn new(config: ConveyorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ConveyorConfig {
        &self.config
    }

    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.application.name
    }

    /// Returns the deployment environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.config.application.environment
    }
}

/// An application: the three standard pipelines, the event monitor, and
/// the installed plugins.
///
/// Installation needs `&mut Application`. Once installation is done, wrap
/// the application in an [`ApplicationEngine`](crate::ApplicationEngine) to
/// process calls.
pub struct Application {
    environment: ApplicationEnvironment,
    call: CallPipeline,
    receive: ReceivePipeline,
    send: SendPipeline,
    monitor: Events,
    plugins: Attributes,
    installed: Vec<&'static str>,
}

impl Application {
    /// Creates an application with the standard phases and the default
    /// transformations installed.
    ///
    /// # Errors
    ///
    /// Returns an error if a default interceptor cannot be registered.
    pub fn new(environment: ApplicationEnvironment) -> PipelineResult<Self> {
        let policy = environment.config().pipeline.duplicate_phases;
        let mut application = Self {
            call: PipelineBuilder::new().policy(policy).phases(CallPhase::all()).build(),
            receive: PipelineBuilder::new().policy(policy).phases(ReceivePhase::all()).build(),
            send: PipelineBuilder::new().policy(policy).phases(SendPhase::all()).build(),
            monitor: Events::new(),
            plugins: Attributes::new(),
            installed: Vec::new(),
            environment,
        };
        transforms::install_defaults(&mut application)?;
        Ok(application)
    }

    /// Creates an application from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a default interceptor cannot be registered.
    pub fn with_config(config: ConveyorConfig) -> PipelineResult<Self> {
        Self::new(ApplicationEnvironment::new(config))
    }

    /// Returns the environment.
    #[must_use]
    pub const fn environment(&self) -> &ApplicationEnvironment {
        &self.environment
    }

    /// Returns the call pipeline.
    #[must_use]
    pub const fn call_pipeline(&self) -> &CallPipeline {
        &self.call
    }

    /// Returns the call pipeline mutably.
    pub fn call_pipeline_mut(&mut self) -> &mut CallPipeline {
        &mut self.call
    }

    /// Returns the receive pipeline.
    #[must_use]
    pub const fn receive_pipeline(&self) -> &ReceivePipeline {
        &self.receive
    }

    /// Returns the receive pipeline mutably.
    pub fn receive_pipeline_mut(&mut self) -> &mut ReceivePipeline {
        &mut self.receive
    }

    /// Returns the send pipeline.
    #[must_use]
    pub const fn send_pipeline(&self) -> &SendPipeline {
        &self.send
    }

    /// Returns the send pipeline mutably.
    pub fn send_pipeline_mut(&mut self) -> &mut SendPipeline {
        &mut self.send
    }

    /// Returns the event monitor.
    #[must_use]
    pub const fn monitor(&self) -> &Events {
        &self.monitor
    }

    /// Returns the event monitor mutably.
    pub fn monitor_mut(&mut self) -> &mut Events {
        &mut self.monitor
    }

    /// Installs `plugin`, configuring it with `configure`.
    ///
    /// The configuration is created by the plugin, passed to `configure`,
    /// then frozen. The plugin body runs against a [`PluginBuilder`] and its
    /// registrations are applied all at once: if any of them fails, the
    /// pipelines and monitor are restored to their state before the call.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DuplicatePlugin`] if the key is already installed
    ///   and the policy is [`DuplicatePluginPolicy::Reject`]
    /// - any error raised while applying the plugin's registrations
    pub fn install<Config, F>(
        &mut self,
        plugin: &ApplicationPlugin<Config>,
        configure: F,
    ) -> PipelineResult<Arc<PluginInstance<Config>>>
    where
        Config: Send + Sync + 'static,
        F: FnOnce(&mut Config),
    {
        let key = plugin.key();
        let policy = self.environment.config().pipeline.duplicate_plugins;
        if policy == DuplicatePluginPolicy::Reject && self.has_plugin(key) {
            return Err(PipelineError::duplicate_plugin(key));
        }

        let mut config = plugin.create_configuration();
        configure(&mut config);
        let config = Arc::new(config);

        let mut builder = PluginBuilder::new(key, Arc::clone(&config), self.environment.clone());
        plugin.build(&mut builder);
        let registrations = builder.into_registrations();

        let call = self.call.clone();
        let receive = self.receive.clone();
        let send = self.send.clone();
        let monitor = self.monitor.clone();

        for registration in registrations {
            if let Err(err) = registration(self) {
                warn!(plugin = key, error = %err, "Plugin installation failed, rolling back");
                self.call = call;
                self.receive = receive;
                self.send = send;
                self.monitor = monitor;
                return Err(err);
            }
        }

        let instance = Arc::new(PluginInstance::new(key, config));
        let registry_key = AttributeKey::<Vec<Arc<PluginInstance<Config>>>>::new(key);
        match self.plugins.get_mut(&registry_key) {
            Some(instances) => instances.push(Arc::clone(&instance)),
            None => self
                .plugins
                .put(&registry_key, vec![Arc::clone(&instance)]),
        }
        self.installed.push(key);

        debug!(plugin = key, instances = self.plugin_count(key), "Plugin installed");
        Ok(instance)
    }

    /// Installs `plugin` with its default configuration.
    ///
    /// # Errors
    ///
    /// See [`install`](Self::install).
    pub fn install_default<Config>(
        &mut self,
        plugin: &ApplicationPlugin<Config>,
    ) -> PipelineResult<Arc<PluginInstance<Config>>>
    where
        Config: Send + Sync + 'static,
    {
        self.install(plugin, |_| {})
    }

    /// Returns the first installed instance of the plugin `key`.
    #[must_use]
    pub fn plugin<Config: Send + Sync + 'static>(
        &self,
        key: &'static str,
    ) -> Option<Arc<PluginInstance<Config>>> {
        self.plugin_instances::<Config>(key).first().cloned()
    }

    /// Returns the first installed instance of the plugin `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingPlugin`] if no instance with this key
    /// and configuration type is installed.
    pub fn plugin_or_err<Config: Send + Sync + 'static>(
        &self,
        key: &'static str,
    ) -> PipelineResult<Arc<PluginInstance<Config>>> {
        self.plugin(key)
            .ok_or_else(|| PipelineError::missing_plugin(key))
    }

    /// Returns every installed instance of the plugin `key`, in install order.
    #[must_use]
    pub fn plugin_instances<Config: Send + Sync + 'static>(
        &self,
        key: &'static str,
    ) -> &[Arc<PluginInstance<Config>>] {
        let registry_key = AttributeKey::<Vec<Arc<PluginInstance<Config>>>>::new(key);
        self.plugins
            .get_or_none(&registry_key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns `true` if a plugin with this key is installed.
    #[must_use]
    pub fn has_plugin(&self, key: &str) -> bool {
        self.installed.iter().any(|installed| *installed == key)
    }

    /// Returns installed plugin keys in install order.
    #[must_use]
    pub fn installed_plugins(&self) -> &[&'static str] {
        &self.installed
    }

    fn plugin_count(&self, key: &str) -> usize {
        self.installed.iter().filter(|k| **k == key).count()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.environment.name())
            .field("call", &self.call)
            .field("receive", &self.receive)
            .field("send", &self.send)
            .field("monitor", &self.monitor)
            .field("plugins", &self.installed)
            .finish()
    }
}
