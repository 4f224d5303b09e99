//! Pipeline phase identity.

use std::borrow::Cow;
use std::fmt;

/// A named ordering checkpoint within a pipeline.
///
/// Phases are compared by name only. Standard phases are declared as
/// constants with [`PipelinePhase::new`]; dynamically created phases use
/// [`PipelinePhase::named`].
///
/// # Example
///
/// ```
/// use conveyor_core::PipelinePhase;
///
/// const BEFORE: PipelinePhase = PipelinePhase::new("Before");
///
/// assert_eq!(BEFORE.name(), "Before");
/// assert_eq!(BEFORE, PipelinePhase::named("Before".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelinePhase {
    name: Cow<'static, str>,
}

impl PipelinePhase {
    /// Creates a phase from a static name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    /// Creates a phase from an owned name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
        }
    }

    /// Returns the phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&'static str> for PipelinePhase {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PipelinePhase {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}
