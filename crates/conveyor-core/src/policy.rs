//! Registration policies.

use serde::{Deserialize, Serialize};

/// What happens when a phase name is registered twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePhasePolicy {
    /// Fail with `PipelineError::DuplicatePhase`.
    #[default]
    Reject,
    /// Keep the existing phase and its position; the second registration is a no-op.
    Ignore,
}

/// What happens when a plugin is installed twice into the same application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePluginPolicy {
    /// Fail with `PipelineError::DuplicatePlugin`.
    #[default]
    Reject,
    /// Install an independent second instance; both stay active.
    Allow,
}
