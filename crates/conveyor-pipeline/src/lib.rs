//! # Conveyor Pipeline
//!
//! Ordered, interceptable, asynchronous execution pipeline.
//!
//! A pipeline is a list of named phases. Each phase holds interceptors that
//! run in registration order; phases run in registry order. One execution
//! threads a single call and a replaceable subject through the chain.
//!
//! ```text
//!  Phase:     Setup ──▶ Monitoring ──▶ Plugins ──▶ Call ──▶ Fallback
//!              │            │             │          │          │
//!  Chain:     [s1]      [m1, m2]        [p1]       [c1]       [f1]
//! ```
//!
//! ## Key Features
//!
//! - **Phase insertion**: [`Pipeline::insert_phase_before`] / [`Pipeline::insert_phase_after`]
//! - **Onion semantics**: [`PipelineContext::proceed`] resumes the caller after
//!   every downstream interceptor ran
//! - **Short-circuit**: [`PipelineContext::finish`] stops the traversal without error
//! - **Error propagation**: errors surface at the enclosing `proceed()` call site
//! - **Cancellation**: each traversal carries a `CancellationToken`
//! - **Snapshots**: a traversal never observes registrations made after it started
//!
//! ## Example
//!
//! ```
//! use conveyor_core::PipelinePhase;
//! use conveyor_pipeline::{Pipeline, PipelineBuilder};
//!
//! const CALL: PipelinePhase = PipelinePhase::new("Call");
//!
//! let pipeline: Pipeline<(), ()> = PipelineBuilder::new().phase(CALL).build();
//! assert_eq!(pipeline.phase_names(), vec!["Call"]);
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod interceptor;
pub mod phases;
pub mod pipeline;

// Re-export main types at crate root
pub use context::{PipelineContext, PipelineOutcome};
pub use interceptor::{BoxFuture, FnInterceptor, Interceptor};
pub use phases::{PhaseRegistry, PhaseRelation};
pub use pipeline::{Pipeline, PipelineBuilder, SharedInterceptor};
pub use tokio_util::sync::CancellationToken;
