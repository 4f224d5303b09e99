//! Ordered phase registry.
//!
//! A [`PhaseRegistry`] keeps phases in execution order together with the
//! relation each phase was registered with and a per-phase payload (the
//! interceptor list, for a [`Pipeline`](crate::Pipeline)).
//!
//! ## Insertion rules
//!
//! | Operation | Placement |
//! |-----------|-----------|
//! | `add_phase(p)` | At the end |
//! | `insert_phase_before(r, p)` | Immediately before `r` |
//! | `insert_phase_after(r, p)` | After `r` and after every phase previously inserted after `r` |
//!
//! Existing phases never move relative to each other, so every recorded
//! relation stays satisfied after any later insertion.

use conveyor_core::{DuplicatePhasePolicy, PipelineError, PipelinePhase, PipelineResult};
use tracing::debug;

/// How a phase was positioned when it was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseRelation {
    /// Appended at the end.
    Last,
    /// Inserted before the referenced phase.
    Before(PipelinePhase),
    /// Inserted after the referenced phase.
    After(PipelinePhase),
}

#[derive(Debug, Clone)]
struct PhaseEntry<T> {
    phase: PipelinePhase,
    relation: PhaseRelation,
    content: T,
}

/// Ordered list of named phases, each carrying a payload of type `T`.
///
/// # Example
///
/// ```
/// use conveyor_core::{DuplicatePhasePolicy, PipelinePhase};
/// use conveyor_pipeline::PhaseRegistry;
///
/// let before = PipelinePhase::new("Before");
/// let call = PipelinePhase::new("Call");
/// let after = PipelinePhase::new("After");
///
/// let mut registry: PhaseRegistry<()> = PhaseRegistry::new(DuplicatePhasePolicy::Reject);
/// registry.add_phase(call.clone()).unwrap();
/// registry.insert_phase_before(&call, before).unwrap();
/// registry.insert_phase_after(&call, after).unwrap();
///
/// assert_eq!(registry.names(), vec!["Before", "Call", "After"]);
/// ```
#[derive(Debug, Clone)]
pub struct PhaseRegistry<T> {
    entries: Vec<PhaseEntry<T>>,
    policy: DuplicatePhasePolicy,
}

impl<T> PhaseRegistry<T> {
    /// Creates an empty registry with the given duplicate policy.
    #[must_use]
    pub const fn new(policy: DuplicatePhasePolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    /// Returns the duplicate phase policy.
    #[must_use]
    pub const fn policy(&self) -> DuplicatePhasePolicy {
        self.policy
    }

    /// Checks whether `phase` is registered.
    #[must_use]
    pub fn contains(&self, phase: &PipelinePhase) -> bool {
        self.position(phase).is_some()
    }

    /// Returns the execution index of `phase`.
    #[must_use]
    pub fn position(&self, phase: &PipelinePhase) -> Option<usize> {
        self.entries.iter().position(|e| &e.phase == phase)
    }

    /// Returns the relation `phase` was registered with.
    #[must_use]
    pub fn relation(&self, phase: &PipelinePhase) -> Option<&PhaseRelation> {
        self.entries
            .iter()
            .find(|e| &e.phase == phase)
            .map(|e| &e.relation)
    }

    /// Returns the payload of `phase`.
    #[must_use]
    pub fn content(&self, phase: &PipelinePhase) -> Option<&T> {
        self.entries
            .iter()
            .find(|e| &e.phase == phase)
            .map(|e| &e.content)
    }

    /// Returns the payload of `phase` mutably.
    pub fn content_mut(&mut self, phase: &PipelinePhase) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| &e.phase == phase)
            .map(|e| &mut e.content)
    }

    /// Returns the phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = &PipelinePhase> {
        self.entries.iter().map(|e| &e.phase)
    }

    /// Returns the phase names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.phase.name()).collect()
    }

    /// Iterates over phases and their payloads in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&PipelinePhase, &T)> {
        self.entries.iter().map(|e| (&e.phase, &e.content))
    }

    /// Returns the number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no phase is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the duplicate policy. `Ok(false)` means the registration is skipped.
    fn admit(&self, phase: &PipelinePhase) -> PipelineResult<bool> {
        if !self.contains(phase) {
            return Ok(true);
        }
        match self.policy {
            DuplicatePhasePolicy::Reject => Err(PipelineError::duplicate_phase(phase.name())),
            DuplicatePhasePolicy::Ignore => {
                debug!(phase = %phase, "Phase already registered, ignoring");
                Ok(false)
            }
        }
    }

    fn require(&self, reference: &PipelinePhase) -> PipelineResult<usize> {
        self.position(reference)
            .ok_or_else(|| PipelineError::unknown_phase(reference.name()))
    }
}

impl<T: Default> PhaseRegistry<T> {
    /// Appends `phase` at the end.
    ///
    /// Returns `Ok(false)` if the phase already existed and the policy is
    /// [`DuplicatePhasePolicy::Ignore`].
    pub fn add_phase(&mut self, phase: PipelinePhase) -> PipelineResult<bool> {
        if !self.admit(&phase)? {
            return Ok(false);
        }
        debug!(phase = %phase, "Adding phase");
        self.entries.push(PhaseEntry {
            phase,
            relation: PhaseRelation::Last,
            content: T::default(),
        });
        Ok(true)
    }

    /// Inserts `phase` immediately before `reference`.
    pub fn insert_phase_before(
        &mut self,
        reference: &PipelinePhase,
        phase: PipelinePhase,
    ) -> PipelineResult<bool> {
        if !self.admit(&phase)? {
            return Ok(false);
        }
        let index = self.require(reference)?;
        debug!(phase = %phase, before = %reference, "Inserting phase");
        self.entries.insert(
            index,
            PhaseEntry {
                phase,
                relation: PhaseRelation::Before(reference.clone()),
                content: T::default(),
            },
        );
        Ok(true)
    }

    /// Inserts `phase` after `reference` and after every phase that was
    /// previously inserted after `reference`.
    pub fn insert_phase_after(
        &mut self,
        reference: &PipelinePhase,
        phase: PipelinePhase,
    ) -> PipelineResult<bool> {
        if !self.admit(&phase)? {
            return Ok(false);
        }
        let index = self.require(reference)?;
        let mut last_related = index;
        for (offset, entry) in self.entries.iter().enumerate().skip(index + 1) {
            if matches!(&entry.relation, PhaseRelation::After(r) if r == reference) {
                last_related = offset;
            }
        }
        debug!(phase = %phase, after = %reference, "Inserting phase");
        self.entries.insert(
            last_related + 1,
            PhaseEntry {
                phase,
                relation: PhaseRelation::After(reference.clone()),
                content: T::default(),
            },
        );
        Ok(true)
    }
}

impl<T> Default for PhaseRegistry<T> {
    fn default() -> Self {
        Self::new(DuplicatePhasePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: PipelinePhase = PipelinePhase::new("A");
    const B: PipelinePhase = PipelinePhase::new("B");
    const C: PipelinePhase = PipelinePhase::new("C");

    fn registry(phases: &[PipelinePhase]) -> PhaseRegistry<()> {
        let mut registry = PhaseRegistry::new(DuplicatePhasePolicy::Reject);
        for phase in phases {
            registry.add_phase(phase.clone()).unwrap();
        }
        registry
    }

    #[test]
    fn test_add_phase_appends() {
        let registry = registry(&[A, B, C]);
        assert_eq!(registry.names(), vec!["A", "B", "C"]);
        assert_eq!(registry.relation(&B), Some(&PhaseRelation::Last));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_insert_before_is_immediate() {
        let mut registry = registry(&[A, B]);
        registry.insert_phase_before(&B, PipelinePhase::new("X")).unwrap();
        registry.insert_phase_before(&B, PipelinePhase::new("Y")).unwrap();
        assert_eq!(registry.names(), vec!["A", "X", "Y", "B"]);
        assert_eq!(
            registry.relation(&PipelinePhase::new("X")),
            Some(&PhaseRelation::Before(B))
        );
    }

    #[test]
    fn test_insert_after_keeps_registration_order() {
        let mut registry = registry(&[A, B]);
        registry.insert_phase_after(&A, PipelinePhase::new("X")).unwrap();
        registry.insert_phase_after(&A, PipelinePhase::new("Y")).unwrap();
        assert_eq!(registry.names(), vec!["A", "X", "Y", "B"]);
    }

    #[test]
    fn test_insert_after_skips_unrelated_phases() {
        let mut registry = registry(&[A, B]);
        registry.insert_phase_after(&A, PipelinePhase::new("X")).unwrap();
        registry.insert_phase_after(&B, PipelinePhase::new("Z")).unwrap();
        registry.insert_phase_after(&A, PipelinePhase::new("Y")).unwrap();
        assert_eq!(registry.names(), vec!["A", "X", "Y", "B", "Z"]);
    }

    #[test]
    fn test_unknown_reference_fails() {
        let mut registry = registry(&[A]);
        let err = registry
            .insert_phase_before(&B, PipelinePhase::new("X"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPhase { ref phase } if phase == "B"));
        assert!(registry
            .insert_phase_after(&B, PipelinePhase::new("X"))
            .is_err());
        assert_eq!(registry.names(), vec!["A"]);
    }

    #[test]
    fn test_duplicate_rejected_by_default() {
        let mut registry = registry(&[A, B]);
        assert!(matches!(
            registry.add_phase(A),
            Err(PipelineError::DuplicatePhase { .. })
        ));
        assert!(matches!(
            registry.insert_phase_after(&B, A),
            Err(PipelineError::DuplicatePhase { .. })
        ));
        assert_eq!(registry.names(), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_ignored_keeps_position() {
        let mut registry: PhaseRegistry<()> = PhaseRegistry::new(DuplicatePhasePolicy::Ignore);
        registry.add_phase(A).unwrap();
        registry.add_phase(B).unwrap();
        assert!(!registry.add_phase(A).unwrap());
        assert!(!registry.insert_phase_after(&B, A).unwrap());
        assert_eq!(registry.names(), vec!["A", "B"]);
    }

    #[test]
    fn test_content_is_per_phase() {
        let mut registry: PhaseRegistry<Vec<u8>> = PhaseRegistry::default();
        registry.add_phase(A).unwrap();
        registry.add_phase(B).unwrap();
        registry.content_mut(&B).unwrap().push(1);
        assert_eq!(registry.content(&A), Some(&Vec::new()));
        assert_eq!(registry.content(&B), Some(&vec![1]));
        assert!(registry.content(&C).is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Before(usize),
        After(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..64).prop_map(Op::Before),
            (0usize..64).prop_map(Op::After)
        ]
    }

    proptest! {
        #[test]
        fn prop_relations_hold_after_any_insertion_sequence(ops in proptest::collection::vec(op(), 0..32)) {
            let mut registry = registry(&[A, B]);
            for (n, op) in ops.iter().enumerate() {
                let existing: Vec<PipelinePhase> = registry.phases().cloned().collect();
                let phase = PipelinePhase::named(format!("P{n}"));
                match op {
                    Op::Before(i) => {
                        let reference = &existing[i % existing.len()];
                        registry.insert_phase_before(reference, phase).unwrap();
                    }
                    Op::After(i) => {
                        let reference = &existing[i % existing.len()];
                        registry.insert_phase_after(reference, phase).unwrap();
                    }
                }
            }

            prop_assert!(registry.position(&A) < registry.position(&B));
            for phase in registry.phases() {
                let position = registry.position(phase);
                match registry.relation(phase) {
                    Some(PhaseRelation::Before(r)) => prop_assert!(position < registry.position(r)),
                    Some(PhaseRelation::After(r)) => prop_assert!(position > registry.position(r)),
                    _ => {}
                }
            }
        }
    }
}
