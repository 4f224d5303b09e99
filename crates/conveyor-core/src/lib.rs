//! # Conveyor Core
//!
//! Core types shared by every Conveyor crate.
//!
//! This crate provides the foundational vocabulary of the pipeline engine:
//!
//! - [`PipelinePhase`] - A named ordering checkpoint within a pipeline
//! - [`Attributes`] / [`AttributeKey`] - Typed per-call key/value store
//! - [`CallId`] - UUID v7 call identifier
//! - [`PipelineError`] - The error taxonomy of the engine
//! - [`DuplicatePhasePolicy`] / [`DuplicatePluginPolicy`] - Registration policies

#![doc(html_root_url = "https://docs.rs/conveyor-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod attributes;
mod call_id;
mod error;
mod phase;
mod policy;

pub use attributes::{AttributeKey, Attributes};
pub use call_id::CallId;
pub use error::{PipelineError, PipelineResult};
pub use phase::PipelinePhase;
pub use policy::{DuplicatePhasePolicy, DuplicatePluginPolicy};
