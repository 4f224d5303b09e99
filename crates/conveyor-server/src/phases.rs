//! Standard phases of the call, receive and send pipelines.

use conveyor_core::PipelinePhase;

/// Phases of the call pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CallPhase;

impl CallPhase {
    /// Prepares the call for processing.
    pub const SETUP: PipelinePhase = PipelinePhase::new("Setup");
    /// Tracing and monitoring of the call.
    pub const MONITORING: PipelinePhase = PipelinePhase::new("Monitoring");
    /// Plugin interceptors (`on_call`).
    pub const PLUGINS: PipelinePhase = PipelinePhase::new("Plugins");
    /// Request handling.
    pub const CALL: PipelinePhase = PipelinePhase::new("Call");
    /// Runs when nothing handled the call.
    pub const FALLBACK: PipelinePhase = PipelinePhase::new("Fallback");

    /// All phases in execution order.
    #[must_use]
    pub fn all() -> [PipelinePhase; 5] {
        [
            Self::SETUP,
            Self::MONITORING,
            Self::PLUGINS,
            Self::CALL,
            Self::FALLBACK,
        ]
    }
}

/// Phases of the receive pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ReceivePhase;

impl ReceivePhase {
    /// Runs before any transformation.
    pub const BEFORE: PipelinePhase = PipelinePhase::new("Before");
    /// Plugin body transformations (`on_call_receive`).
    pub const TRANSFORM: PipelinePhase = PipelinePhase::new("Transform");
    /// Default transformations of the raw body.
    pub const AFTER: PipelinePhase = PipelinePhase::new("After");

    /// All phases in execution order.
    #[must_use]
    pub fn all() -> [PipelinePhase; 3] {
        [Self::BEFORE, Self::TRANSFORM, Self::AFTER]
    }
}

/// Phases of the send pipeline.
#[derive(Debug, Clone, Copy)]
pub struct SendPhase;

impl SendPhase {
    /// Runs before any transformation.
    pub const BEFORE: PipelinePhase = PipelinePhase::new("Before");
    /// Plugin value transformations (`on_call_respond`).
    pub const TRANSFORM: PipelinePhase = PipelinePhase::new("Transform");
    /// Default rendering into `OutgoingContent`.
    pub const RENDER: PipelinePhase = PipelinePhase::new("Render");
    /// Content encoding (compression).
    pub const CONTENT_ENCODING: PipelinePhase = PipelinePhase::new("ContentEncoding");
    /// Transfer encoding.
    pub const TRANSFER_ENCODING: PipelinePhase = PipelinePhase::new("TransferEncoding");
    /// Plugin content transformations (`on_call_respond_after_transform`).
    pub const AFTER: PipelinePhase = PipelinePhase::new("After");
    /// Commits the content to the call response.
    pub const ENGINE: PipelinePhase = PipelinePhase::new("Engine");

    /// All phases in execution order.
    #[must_use]
    pub fn all() -> [PipelinePhase; 7] {
        [
            Self::BEFORE,
            Self::TRANSFORM,
            Self::RENDER,
            Self::CONTENT_ENCODING,
            Self::TRANSFER_ENCODING,
            Self::AFTER,
            Self::ENGINE,
        ]
    }
}
