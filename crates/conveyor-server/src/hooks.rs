//! Hooks: named extension points with a fixed attachment strategy.
//!
//! A hook maps a handler onto the application, either by intercepting a
//! pipeline phase or by subscribing to the monitor. Plugins install hooks
//! through [`PluginBuilder::on`](crate::PluginBuilder::on).

use crate::application::Application;
use crate::call::ApplicationCall;
use crate::events::{EventDefinition, EventHandler};
use crate::phases::{CallPhase, SendPhase};
use conveyor_core::{PipelineError, PipelinePhase, PipelineResult};
use conveyor_pipeline::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// Handler receiving the call.
pub type CallHandler =
    Arc<dyn for<'a> Fn(&'a mut ApplicationCall) -> BoxFuture<'a, PipelineResult<()>> + Send + Sync>;

/// Handler receiving the call and the error that failed it.
pub type CallFailedHandler = Arc<
    dyn for<'a> Fn(&'a mut ApplicationCall, &'a PipelineError) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync,
>;

/// Wraps a closure as a [`CallHandler`].
pub fn call_handler<F>(handler: F) -> CallHandler
where
    F: for<'a> Fn(&'a mut ApplicationCall) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(handler)
}

/// Wraps a closure as a [`CallFailedHandler`].
pub fn call_failed_handler<F>(handler: F) -> CallFailedHandler
where
    F: for<'a> Fn(&'a mut ApplicationCall, &'a PipelineError) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(handler)
}

/// Wraps a closure as an [`EventHandler`].
pub fn event_handler<T, F>(handler: F) -> EventHandler<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// A named extension point.
pub trait Hook {
    /// The handler this hook accepts.
    type Handler;

    /// Attaches `handler` to `application`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline rejects the registration.
    fn install(&self, application: &mut Application, handler: Self::Handler) -> PipelineResult<()>;
}

/// Runs the handler in the call pipeline's `Setup` phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallSetup;

impl Hook for CallSetup {
    type Handler = CallHandler;

    fn install(&self, application: &mut Application, handler: CallHandler) -> PipelineResult<()> {
        application
            .call_pipeline_mut()
            .intercept_named(&CallPhase::SETUP, "CallSetup", move |ctx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler(ctx.context_mut()).await })
            })
    }
}

/// Runs the handler in a dedicated `CallStarted` phase, before `Monitoring`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallStarted;

impl CallStarted {
    /// The phase this hook inserts into the call pipeline.
    pub const PHASE: PipelinePhase = PipelinePhase::new("CallStarted");
}

impl Hook for CallStarted {
    type Handler = CallHandler;

    fn install(&self, application: &mut Application, handler: CallHandler) -> PipelineResult<()> {
        let pipeline = application.call_pipeline_mut();
        if !pipeline.has_phase(&Self::PHASE) {
            pipeline.insert_phase_before(&CallPhase::MONITORING, Self::PHASE)?;
            debug!(phase = %Self::PHASE, "Inserted call started phase");
        }
        pipeline.intercept_named(&Self::PHASE, "CallStarted", move |ctx| {
            let handler = Arc::clone(&handler);
            Box::pin(async move { handler(ctx.context_mut()).await })
        })
    }
}

/// Wraps everything after `Monitoring` and runs the handler once the call
/// ends, whether it completed, finished early or failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallCompleted;

impl Hook for CallCompleted {
    type Handler = CallHandler;

    fn install(&self, application: &mut Application, handler: CallHandler) -> PipelineResult<()> {
        application
            .call_pipeline_mut()
            .intercept_named(&CallPhase::MONITORING, "CallCompleted", move |ctx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let result = ctx.proceed().await;
                    let completed = handler(ctx.context_mut()).await;
                    result.and(completed)
                })
            })
    }
}

/// Wraps everything after `Monitoring`; on failure, runs the handler with
/// the error and re-raises it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallFailed;

impl Hook for CallFailed {
    type Handler = CallFailedHandler;

    fn install(
        &self,
        application: &mut Application,
        handler: CallFailedHandler,
    ) -> PipelineResult<()> {
        application
            .call_pipeline_mut()
            .intercept_named(&CallPhase::MONITORING, "CallFailed", move |ctx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    match ctx.proceed().await {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            handler(ctx.context_mut(), &err).await?;
                            Err(err)
                        }
                    }
                })
            })
    }
}

/// Runs the handler after the send pipeline committed the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSent;

impl Hook for ResponseSent {
    type Handler = CallHandler;

    fn install(&self, application: &mut Application, handler: CallHandler) -> PipelineResult<()> {
        // The engine writer is registered on this phase when the application
        // is created, so it always runs first.
        application
            .send_pipeline_mut()
            .intercept_named(&SendPhase::ENGINE, "ResponseSent", move |ctx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    if ctx.context().response().is_committed() {
                        handler(ctx.context_mut()).await?;
                    }
                    Ok(())
                })
            })
    }
}

/// Subscribes the handler to an event on the application monitor.
#[derive(Debug)]
pub struct MonitoringEvent<T> {
    definition: EventDefinition<T>,
}

impl<T> MonitoringEvent<T> {
    /// Creates a hook for `definition`.
    #[must_use]
    pub const fn new(definition: EventDefinition<T>) -> Self {
        Self { definition }
    }
}

impl<T> Clone for MonitoringEvent<T> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition,
        }
    }
}

impl<T: 'static> Hook for MonitoringEvent<T> {
    type Handler = EventHandler<T>;

    fn install(&self, application: &mut Application, handler: EventHandler<T>) -> PipelineResult<()> {
        application.monitor_mut().subscribe(&self.definition, handler);
        Ok(())
    }
}
