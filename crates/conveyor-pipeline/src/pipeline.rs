//! Phased interceptor pipeline.
//!
//! A [`Pipeline`] owns an ordered set of phases and, per phase, an ordered
//! list of interceptors. Executing the pipeline runs every interceptor of the
//! first phase in registration order, then the second phase, and so on.
//!
//! Mutating a pipeline (adding phases, registering interceptors) requires
//! `&mut Pipeline`. Each execution walks an `Arc` snapshot of the flattened
//! chain, so a traversal never observes registrations made after it started.
//!
//! # Example
//!
//! ```
//! use conveyor_core::PipelinePhase;
//! use conveyor_pipeline::{Pipeline, PipelineBuilder};
//!
//! const BEFORE: PipelinePhase = PipelinePhase::new("Before");
//! const CALL: PipelinePhase = PipelinePhase::new("Call");
//!
//! # tokio_test::block_on(async {
//! let mut pipeline: Pipeline<String, Vec<String>> =
//!     PipelineBuilder::new().phase(BEFORE).phase(CALL).build();
//!
//! pipeline
//!     .intercept(&CALL, |ctx| {
//!         Box::pin(async move {
//!             let seen = ctx.subject().clone();
//!             ctx.context_mut().push(seen);
//!             Ok(())
//!         })
//!     })
//!     .unwrap();
//!
//! let mut log = Vec::new();
//! let outcome = pipeline.execute(&mut log, "hello".to_string()).await.unwrap();
//! assert!(!outcome.is_finished());
//! assert_eq!(log, vec!["hello".to_string()]);
//! # });
//! ```

use crate::context::{InterceptorSlot, PipelineContext, PipelineOutcome};
use crate::interceptor::{BoxFuture, FnInterceptor, Interceptor};
use crate::phases::{PhaseRegistry, PhaseRelation};
use conveyor_core::{DuplicatePhasePolicy, PipelineError, PipelinePhase, PipelineResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A type-erased interceptor that can be shared between pipelines.
pub type SharedInterceptor<S, C> = Arc<dyn Interceptor<S, C>>;

/// An ordered, phased interceptor chain over subject `S` and call `C`.
pub struct Pipeline<S, C> {
    registry: PhaseRegistry<Vec<SharedInterceptor<S, C>>>,
    snapshot: Arc<[InterceptorSlot<S, C>]>,
}

impl<S, C> Pipeline<S, C>
where
    S: 'static,
    C: 'static,
{
    /// Creates an empty pipeline.
    ///
    /// Use [`PipelineBuilder`] to start from a list of phases.
    #[must_use]
    pub fn new(policy: DuplicatePhasePolicy) -> Self {
        Self {
            registry: PhaseRegistry::new(policy),
            snapshot: Arc::from(Vec::new()),
        }
    }

    /// Appends a phase at the end.
    pub fn add_phase(&mut self, phase: PipelinePhase) -> PipelineResult<bool> {
        self.registry.add_phase(phase)
    }

    /// Inserts a phase immediately before `reference`.
    pub fn insert_phase_before(
        &mut self,
        reference: &PipelinePhase,
        phase: PipelinePhase,
    ) -> PipelineResult<bool> {
        self.registry.insert_phase_before(reference, phase)
    }

    /// Inserts a phase after `reference` and after any phase previously
    /// inserted after it.
    pub fn insert_phase_after(
        &mut self,
        reference: &PipelinePhase,
        phase: PipelinePhase,
    ) -> PipelineResult<bool> {
        self.registry.insert_phase_after(reference, phase)
    }

    /// Checks whether `phase` is registered.
    #[must_use]
    pub fn has_phase(&self, phase: &PipelinePhase) -> bool {
        self.registry.contains(phase)
    }

    /// Returns the phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = &PipelinePhase> {
        self.registry.phases()
    }

    /// Returns the phase names in execution order.
    #[must_use]
    pub fn phase_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Returns the underlying phase registry.
    #[must_use]
    pub const fn registry(&self) -> &PhaseRegistry<Vec<SharedInterceptor<S, C>>> {
        &self.registry
    }

    /// Registers a shared interceptor on `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownPhase`] if `phase` is not registered.
    pub fn intercept_shared(
        &mut self,
        phase: &PipelinePhase,
        interceptor: SharedInterceptor<S, C>,
    ) -> PipelineResult<()> {
        let interceptors = self
            .registry
            .content_mut(phase)
            .ok_or_else(|| PipelineError::unknown_phase(phase.name()))?;
        debug!(phase = %phase, interceptor = interceptor.name(), "Registering interceptor");
        interceptors.push(interceptor);
        self.rebuild();
        Ok(())
    }

    /// Registers an interceptor on `phase`.
    pub fn intercept_with<I>(&mut self, phase: &PipelinePhase, interceptor: I) -> PipelineResult<()>
    where
        I: Interceptor<S, C>,
    {
        self.intercept_shared(phase, Arc::new(interceptor))
    }

    /// Returns the number of interceptors across all phases.
    #[must_use]
    pub fn interceptors_count(&self) -> usize {
        self.snapshot.len()
    }

    /// Returns the names of the interceptors registered on `phase`.
    #[must_use]
    pub fn interceptors_in(&self, phase: &PipelinePhase) -> Vec<&'static str> {
        self.registry
            .content(phase)
            .map(|list| list.iter().map(|i| i.name()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if no interceptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Adds the phases and interceptors of `other` to this pipeline.
    ///
    /// Missing phases are placed using the relation they have in `other`,
    /// falling back to the end when the referenced phase is missing here too.
    /// Interceptors of `other` run after this pipeline's own interceptors
    /// of the same phase.
    pub fn merge(&mut self, other: &Self) -> PipelineResult<()> {
        for (phase, _) in other.registry.iter() {
            if self.registry.contains(phase) {
                continue;
            }
            match other.registry.relation(phase) {
                Some(PhaseRelation::Before(r)) if self.registry.contains(r) => {
                    self.registry.insert_phase_before(r, phase.clone())?;
                }
                Some(PhaseRelation::After(r)) if self.registry.contains(r) => {
                    self.registry.insert_phase_after(r, phase.clone())?;
                }
                _ => {
                    self.registry.add_phase(phase.clone())?;
                }
            }
        }
        for (phase, interceptors) in other.registry.iter() {
            if let Some(own) = self.registry.content_mut(phase) {
                own.extend(interceptors.iter().cloned());
            }
        }
        self.rebuild();
        Ok(())
    }

    fn rebuild(&mut self) {
        let mut slots = Vec::new();
        for (phase_index, (phase, interceptors)) in self.registry.iter().enumerate() {
            for (index_in_phase, interceptor) in interceptors.iter().enumerate() {
                slots.push(InterceptorSlot {
                    phase: phase.clone(),
                    phase_index,
                    index_in_phase,
                    interceptor: Arc::clone(interceptor),
                });
            }
        }
        self.snapshot = Arc::from(slots);
    }
}

impl<S, C> Pipeline<S, C>
where
    S: Send + 'static,
    C: Send + 'static,
{
    /// Registers a closure interceptor on `phase`.
    pub fn intercept<F>(&mut self, phase: &PipelinePhase, func: F) -> PipelineResult<()>
    where
        F: for<'a, 'c> Fn(&'a mut PipelineContext<'c, S, C>) -> BoxFuture<'a, PipelineResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.intercept_with(phase, FnInterceptor::new("closure", func))
    }

    /// Registers a named closure interceptor on `phase`.
    pub fn intercept_named<F>(
        &mut self,
        phase: &PipelinePhase,
        name: &'static str,
        func: F,
    ) -> PipelineResult<()>
    where
        F: for<'a, 'c> Fn(&'a mut PipelineContext<'c, S, C>) -> BoxFuture<'a, PipelineResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.intercept_with(phase, FnInterceptor::new(name, func))
    }

    /// Runs the pipeline once for `context`, starting with `subject`.
    ///
    /// # Errors
    ///
    /// Returns any error no interceptor recovered from.
    pub async fn execute(&self, context: &mut C, subject: S) -> PipelineResult<PipelineOutcome<S>> {
        self.execute_with_cancellation(context, subject, CancellationToken::new())
            .await
    }

    /// Runs the pipeline once, stopping with [`PipelineError::Cancelled`]
    /// when `cancellation` fires. The interceptor running at that moment is
    /// interrupted; enclosing interceptors see the error from `proceed()`.
    pub async fn execute_with_cancellation(
        &self,
        context: &mut C,
        subject: S,
        cancellation: CancellationToken,
    ) -> PipelineResult<PipelineOutcome<S>> {
        let mut ctx =
            PipelineContext::new(context, subject, Arc::clone(&self.snapshot), cancellation);
        ctx.proceed().await?;
        Ok(ctx.into_outcome())
    }
}

impl<S: 'static, C: 'static> Clone for Pipeline<S, C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

impl<S: 'static, C: 'static> Default for Pipeline<S, C> {
    fn default() -> Self {
        Self::new(DuplicatePhasePolicy::default())
    }
}

impl<S: 'static, C: 'static> std::fmt::Debug for Pipeline<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("phases", &self.registry.names())
            .field("interceptors", &self.snapshot.len())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`] with an initial phase list.
///
/// Phases listed twice are collapsed; the duplicate policy applies to
/// registrations made after the pipeline is built.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    phases: Vec<PipelinePhase>,
    policy: DuplicatePhasePolicy,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a phase.
    #[must_use]
    pub fn phase(mut self, phase: PipelinePhase) -> Self {
        if !self.phases.contains(&phase) {
            self.phases.push(phase);
        }
        self
    }

    /// Appends several phases.
    #[must_use]
    pub fn phases(mut self, phases: impl IntoIterator<Item = PipelinePhase>) -> Self {
        for phase in phases {
            self = self.phase(phase);
        }
        self
    }

    /// Sets the duplicate phase policy.
    #[must_use]
    pub const fn policy(mut self, policy: DuplicatePhasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build<S: 'static, C: 'static>(self) -> Pipeline<S, C> {
        let mut pipeline = Pipeline::new(self.policy);
        for phase in self.phases {
            // Phases are unique here, so the registry cannot reject them.
            let _ = pipeline.add_phase(phase);
        }
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const BEFORE: PipelinePhase = PipelinePhase::new("Before");
    const CALL: PipelinePhase = PipelinePhase::new("Call");
    const AFTER: PipelinePhase = PipelinePhase::new("After");

    type Log = Arc<Mutex<Vec<String>>>;

    fn pipeline() -> Pipeline<u32, ()> {
        PipelineBuilder::new().phases([BEFORE, CALL, AFTER]).build()
    }

    fn record(pipeline: &mut Pipeline<u32, ()>, phase: &PipelinePhase, label: &'static str, log: &Log) {
        let log = Arc::clone(log);
        pipeline
            .intercept_named(phase, label, move |_ctx| {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().push(label.to_string());
                    Ok(())
                })
            })
            .unwrap();
    }

    #[test]
    fn test_builder_collapses_duplicates() {
        let pipeline: Pipeline<u32, ()> = PipelineBuilder::new()
            .phase(BEFORE)
            .phase(CALL)
            .phase(BEFORE)
            .build();
        assert_eq!(pipeline.phase_names(), vec!["Before", "Call"]);
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_intercept_unknown_phase_fails() {
        let mut pipeline = pipeline();
        let err = pipeline
            .intercept(&PipelinePhase::new("Missing"), |_ctx| Box::pin(async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPhase { .. }));
        assert_eq!(pipeline.interceptors_count(), 0);
    }

    #[tokio::test]
    async fn test_phases_run_in_registry_order() {
        let log = Log::default();
        let mut pipeline = pipeline();
        record(&mut pipeline, &AFTER, "after", &log);
        record(&mut pipeline, &CALL, "call-1", &log);
        record(&mut pipeline, &BEFORE, "before", &log);
        record(&mut pipeline, &CALL, "call-2", &log);

        let outcome = pipeline.execute(&mut (), 0).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Completed(0));
        assert_eq!(*log.lock(), vec!["before", "call-1", "call-2", "after"]);
        assert_eq!(pipeline.interceptors_in(&CALL), vec!["call-1", "call-2"]);
    }

    #[tokio::test]
    async fn test_inserted_phase_runs_in_position() {
        let log = Log::default();
        let mut pipeline = pipeline();
        let monitoring = PipelinePhase::new("Monitoring");
        pipeline.insert_phase_after(&BEFORE, monitoring.clone()).unwrap();
        record(&mut pipeline, &CALL, "call", &log);
        record(&mut pipeline, &monitoring, "monitoring", &log);
        record(&mut pipeline, &BEFORE, "before", &log);

        pipeline.execute(&mut (), 0).await.unwrap();
        assert_eq!(*log.lock(), vec!["before", "monitoring", "call"]);
    }

    #[tokio::test]
    async fn test_subject_replacement_is_seen_downstream() {
        let mut pipeline = pipeline();
        pipeline
            .intercept(&BEFORE, |ctx| Box::pin(async move { ctx.proceed_with(41).await }))
            .unwrap();
        pipeline
            .intercept(&CALL, |ctx| {
                Box::pin(async move {
                    *ctx.subject_mut() += 1;
                    Ok(())
                })
            })
            .unwrap();

        let outcome = pipeline.execute(&mut (), 0).await.unwrap();
        assert_eq!(outcome.into_subject(), 42);
    }

    #[tokio::test]
    async fn test_execution_uses_snapshot() {
        let log = Log::default();
        let mut pipeline = pipeline();
        record(&mut pipeline, &CALL, "first", &log);
        let snapshot = pipeline.clone();
        record(&mut pipeline, &CALL, "second", &log);

        snapshot.execute(&mut (), 0).await.unwrap();
        assert_eq!(*log.lock(), vec!["first"]);
        assert_eq!(snapshot.interceptors_count(), 1);
        assert_eq!(pipeline.interceptors_count(), 2);
    }

    #[tokio::test]
    async fn test_merge_appends_phases_and_interceptors() {
        let log = Log::default();
        let mut base = pipeline();
        record(&mut base, &CALL, "base", &log);

        let mut other: Pipeline<u32, ()> = PipelineBuilder::new().phases([CALL, AFTER]).build();
        let render = PipelinePhase::new("Render");
        other.insert_phase_before(&AFTER, render.clone()).unwrap();
        record(&mut other, &CALL, "other", &log);
        record(&mut other, &render, "render", &log);

        base.merge(&other).unwrap();
        assert_eq!(base.phase_names(), vec!["Before", "Call", "Render", "After"]);

        base.execute(&mut (), 0).await.unwrap();
        assert_eq!(*log.lock(), vec!["base", "other", "render"]);
    }

    #[tokio::test]
    async fn test_position_reports_phase_and_index() {
        let mut pipeline = pipeline();
        pipeline
            .intercept(&CALL, |_ctx| Box::pin(async { Ok(()) }))
            .unwrap();
        pipeline
            .intercept(&CALL, |ctx| {
                Box::pin(async move {
                    assert_eq!(ctx.current_phase(), Some(&CALL));
                    assert_eq!(ctx.position(), Some((1, 1)));
                    assert_eq!(ctx.remaining(), 0);
                    Ok(())
                })
            })
            .unwrap();

        pipeline.execute(&mut (), 0).await.unwrap();
    }
}
