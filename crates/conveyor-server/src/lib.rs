//! # Conveyor Server
//!
//! The application layer of the Conveyor pipeline engine.
//!
//! This crate threads each [`ApplicationCall`] through three pipelines:
//!
//! - **Call** (`Setup → Monitoring → Plugins → Call → Fallback`): runs once
//!   per call
//! - **Receive** (`Before → Transform → After`): runs on `call.receive::<T>()`
//! - **Send** (`Before → Transform → Render → ContentEncoding →
//!   TransferEncoding → After → Engine`): runs on `call.respond(value)`
//!
//! Plugins register against these pipelines through a [`PluginBuilder`]
//! and [`Hook`]s; the [`ApplicationEngine`] drives calls and reports a
//! [`CallOutcome`] to the transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use conveyor_server::{create_plugin, Application, ApplicationEngine, CallPhase};
//!
//! let mut application = Application::with_config(Default::default())?;
//! application.call_pipeline_mut().intercept(&CallPhase::CALL, |ctx| {
//!     Box::pin(async move { ctx.context_mut().respond("hello").await })
//! })?;
//!
//! let engine = ApplicationEngine::new(application);
//! engine.start();
//!
//! let outcome = engine.handle(http::Request::new(bytes::Bytes::new())).await;
//! assert!(outcome.is_success());
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod application;
mod call;
mod content;
mod contexts;
mod engine;
mod events;
mod hooks;
mod lifecycle;
mod phases;
mod plugin;
mod transforms;
mod value;

pub use application::{
    Application, ApplicationEnvironment, CallPipeline, ReceivePipeline, SendPipeline,
};
pub use call::{ApplicationCall, ApplicationRequest, ApplicationResponse};
pub use content::{OutgoingContent, APPLICATION_JSON, OCTET_STREAM, TEXT_PLAIN};
pub use contexts::{
    OnCallContext, OnCallReceiveContext, OnCallRespondAfterTransformContext, OnCallRespondContext,
    TransformBodyContext,
};
pub use engine::{
    ApplicationEngine, CallOutcome, CallStatus, CALLS_IN_FLIGHT, CALLS_TOTAL,
    CALL_DURATION_SECONDS,
};
pub use events::{EventDefinition, EventHandler, Events, Subscription};
pub use hooks::{
    call_failed_handler, call_handler, event_handler, CallCompleted, CallFailed,
    CallFailedHandler, CallHandler, CallSetup, CallStarted, Hook, MonitoringEvent, ResponseSent,
};
pub use lifecycle::{
    CallGuard, CallTracker, EngineState, APPLICATION_STARTED, APPLICATION_STARTING,
    APPLICATION_STOPPED, APPLICATION_STOPPING, APPLICATION_STOP_PREPARING,
};
pub use phases::{CallPhase, ReceivePhase, SendPhase};
pub use plugin::{
    create_application_plugin, create_plugin, ApplicationPlugin, PluginBuilder, PluginInstance,
};
pub use value::{AnyValue, ApplicationReceiveRequest, TypeInfo};
