//! # Conveyor
//!
//! **Phased interceptor pipelines and plugins for HTTP call processing**
//!
//! Conveyor processes each call by running it through ordered pipelines of
//! named phases. Interceptors attach to phases; plugins bundle interceptors
//! and hooks behind a key and a frozen configuration.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_env_prefix("CONVEYOR").load()?;
//!     conveyor::telemetry::init_telemetry(&config.telemetry)?;
//!
//!     let mut application = Application::with_config(config)?;
//!     application.install_default(&call_telemetry())?;
//!     application.call_pipeline_mut().intercept(&CallPhase::CALL, |ctx| {
//!         Box::pin(async move { ctx.context_mut().respond("hello").await })
//!     })?;
//!
//!     let engine = ApplicationEngine::new(application);
//!     engine.start();
//!     let outcome = engine.handle(http::Request::new(bytes::Bytes::new())).await;
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Call:    Setup → Monitoring → Plugins → Call → Fallback
//!                                          │
//! Receive: Before → Transform → After ◀────┤ call.receive::<T>()
//!                                          │
//! Send:    Before → Transform → Render → ContentEncoding
//!          → TransferEncoding → After → Engine ◀── call.respond(value)
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use conveyor_core as core;

// Re-export the pipeline engine
pub use conveyor_pipeline as pipeline;

// Re-export application, plugin and engine types
pub use conveyor_server as server;

// Re-export configuration
pub use conveyor_config as config;

// Re-export logging and metrics
pub use conveyor_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use conveyor::prelude::*;
/// ```
pub mod prelude {
    pub use conveyor_core::{
        AttributeKey, Attributes, CallId, DuplicatePhasePolicy, DuplicatePluginPolicy,
        PipelineError, PipelinePhase, PipelineResult,
    };

    pub use conveyor_pipeline::{
        BoxFuture, CancellationToken, Interceptor, Pipeline, PipelineContext, PipelineOutcome,
    };

    // Application, plugins and hooks
    pub use conveyor_server::{
        call_failed_handler, call_handler, create_application_plugin, create_plugin,
        event_handler, Application, ApplicationCall, ApplicationEngine, ApplicationPlugin,
        CallCompleted, CallFailed, CallPhase, CallSetup, CallStarted, CallStatus, EventDefinition,
        Hook, MonitoringEvent, OutgoingContent, PluginBuilder, ReceivePhase, ResponseSent,
        SendPhase,
    };

    pub use conveyor_config::{ConfigLoader, ConveyorConfig};

    pub use conveyor_telemetry::call_telemetry;
}
