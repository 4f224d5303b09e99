//! Per-traversal execution context.
//!
//! A [`PipelineContext`] is the cursor of one pipeline traversal. It is bound
//! to exactly one call (`&mut C`), owns the current subject, and walks an
//! immutable snapshot of the interceptor chain taken when the traversal
//! started.
//!
//! ## Control flow
//!
//! ```text
//!   A-pre ──proceed()──▶ B ──proceed()──▶ C ──▶ (end)
//!                                                │
//!   A-post ◀───────────── B-post ◀───────────────┘
//! ```
//!
//! - `proceed()` runs every remaining interceptor and then returns to the caller.
//! - `finish()` stops the traversal; no further interceptor starts, but the
//!   post-`proceed()` code of enclosing interceptors still runs.
//! - An error stops the traversal and is returned from the enclosing
//!   interceptor's `proceed()`.
//! - Cancelling the traversal's token interrupts the interceptor that is
//!   currently running (dropping its future) and makes the enclosing
//!   `proceed()` fail with [`PipelineError::Cancelled`], which unwinds like
//!   any other error. Interceptors suspended in `proceed()` are not
//!   interrupted, so their post-`proceed()` code still runs.

use crate::interceptor::{BoxFuture, Interceptor};
use conveyor_core::{PipelineError, PipelinePhase, PipelineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// One interceptor in the flattened chain.
pub(crate) struct InterceptorSlot<S, C> {
    pub(crate) phase: PipelinePhase,
    pub(crate) phase_index: usize,
    pub(crate) index_in_phase: usize,
    pub(crate) interceptor: Arc<dyn Interceptor<S, C>>,
}

impl<S, C> Clone for InterceptorSlot<S, C> {
    fn clone(&self) -> Self {
        Self {
            phase: self.phase.clone(),
            phase_index: self.phase_index,
            index_in_phase: self.index_in_phase,
            interceptor: Arc::clone(&self.interceptor),
        }
    }
}

/// How a traversal ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome<S> {
    /// Every interceptor ran.
    Completed(S),
    /// The traversal was stopped early by `finish()` or by an error that an
    /// enclosing interceptor recovered from.
    Finished(S),
}

impl<S> PipelineOutcome<S> {
    /// Returns the final subject.
    #[must_use]
    pub const fn subject(&self) -> &S {
        match self {
            Self::Completed(s) | Self::Finished(s) => s,
        }
    }

    /// Consumes the outcome, returning the final subject.
    #[must_use]
    pub fn into_subject(self) -> S {
        match self {
            Self::Completed(s) | Self::Finished(s) => s,
        }
    }

    /// Returns `true` if the traversal stopped early.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// The cursor of one pipeline traversal.
pub struct PipelineContext<'c, S, C> {
    context: &'c mut C,
    subject: S,
    interceptors: Arc<[InterceptorSlot<S, C>]>,
    index: usize,
    running: Option<usize>,
    done: bool,
    stopped_early: bool,
    cancellation: CancellationToken,
    interrupted: Arc<AtomicBool>,
}

impl<'c, S, C> PipelineContext<'c, S, C> {
    pub(crate) fn new(
        context: &'c mut C,
        subject: S,
        interceptors: Arc<[InterceptorSlot<S, C>]>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            context,
            subject,
            interceptors,
            index: 0,
            running: None,
            done: false,
            stopped_early: false,
            cancellation,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the current subject.
    #[must_use]
    pub const fn subject(&self) -> &S {
        &self.subject
    }

    /// Returns the current subject mutably.
    pub fn subject_mut(&mut self) -> &mut S {
        &mut self.subject
    }

    /// Replaces the subject. Downstream interceptors only observe the new value.
    pub fn set_subject(&mut self, subject: S) {
        self.subject = subject;
    }

    /// Replaces the subject, returning the previous one.
    pub fn replace_subject(&mut self, subject: S) -> S {
        std::mem::replace(&mut self.subject, subject)
    }

    /// Returns the call this traversal is bound to.
    #[must_use]
    pub fn context(&self) -> &C {
        &*self.context
    }

    /// Returns the call this traversal is bound to, mutably.
    pub fn context_mut(&mut self) -> &mut C {
        &mut *self.context
    }

    /// Borrows the call and the subject at the same time.
    pub fn split_mut(&mut self) -> (&mut C, &mut S) {
        (&mut *self.context, &mut self.subject)
    }

    /// Stops the traversal without error.
    ///
    /// No further interceptor starts. Interceptors that are suspended in
    /// `proceed()` resume normally.
    pub fn finish(&mut self) {
        if !self.done {
            trace!(position = self.index, "Pipeline finished early");
        }
        self.done = true;
        self.stopped_early = true;
    }

    /// Returns `true` once the traversal has ended, normally or early.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.done
    }

    /// Returns the phase of the interceptor currently running.
    #[must_use]
    pub fn current_phase(&self) -> Option<&PipelinePhase> {
        self.current_slot().map(|slot| &slot.phase)
    }

    /// Returns `(phase index, interceptor index within phase)` of the
    /// interceptor currently running.
    #[must_use]
    pub fn position(&self) -> Option<(usize, usize)> {
        self.current_slot()
            .map(|slot| (slot.phase_index, slot.index_in_phase))
    }

    /// Returns the number of interceptors that have not started yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.done {
            0
        } else {
            self.interceptors.len() - self.index
        }
    }

    /// Returns the cancellation token of this traversal.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn current_slot(&self) -> Option<&InterceptorSlot<S, C>> {
        self.running.and_then(|i| self.interceptors.get(i))
    }

    pub(crate) fn into_outcome(self) -> PipelineOutcome<S> {
        if self.stopped_early {
            PipelineOutcome::Finished(self.subject)
        } else {
            PipelineOutcome::Completed(self.subject)
        }
    }
}

impl<'c, S, C> PipelineContext<'c, S, C>
where
    S: Send + 'static,
    C: Send + 'static,
{
    /// Runs every remaining interceptor, then returns.
    ///
    /// Interceptors that return without calling `proceed()` are followed by
    /// the next one in chain order, so each interceptor starts at most once.
    ///
    /// # Errors
    ///
    /// Returns the first error raised downstream, or
    /// [`PipelineError::Cancelled`] if the token was cancelled before the
    /// next interceptor could start or while one was running.
    pub fn proceed(&mut self) -> BoxFuture<'_, PipelineResult<()>> {
        Box::pin(async move {
            let caller = self.running;
            while !self.done {
                if self.cancellation.is_cancelled() {
                    return Err(self.cancelled());
                }

                let Some(slot) = self.interceptors.get(self.index).cloned() else {
                    self.done = true;
                    break;
                };
                self.running = Some(self.index);
                self.index += 1;

                trace!(
                    phase = %slot.phase,
                    interceptor = slot.interceptor.name(),
                    "Running interceptor"
                );

                let cancellation = self.cancellation.clone();
                let interrupted = Arc::clone(&self.interrupted);
                // The interceptor is polled first so that a nested `proceed()`
                // reports the cancellation to its caller before this level
                // would drop it.
                let result = tokio::select! {
                    biased;
                    result = slot.interceptor.intercept(&mut *self) => result,
                    () = interruption(&cancellation, &interrupted) => {
                        interrupted.store(true, Ordering::Release);
                        trace!(phase = %slot.phase, "Interceptor interrupted by cancellation");
                        Err(PipelineError::Cancelled)
                    }
                };
                self.running = caller;

                if let Err(err) = result {
                    self.done = true;
                    self.stopped_early = true;
                    return Err(err);
                }
            }
            self.running = caller;
            Ok(())
        })
    }

    fn cancelled(&mut self) -> PipelineError {
        self.done = true;
        self.stopped_early = true;
        trace!(position = self.index, "Pipeline cancelled");
        PipelineError::Cancelled
    }

    /// Replaces the subject, then behaves like [`proceed`](Self::proceed).
    pub fn proceed_with(&mut self, subject: S) -> BoxFuture<'_, PipelineResult<()>> {
        self.subject = subject;
        self.proceed()
    }
}

/// Resolves once `cancellation` fires, unless a deeper level of the same
/// traversal already interrupted its interceptor. In that case the
/// interceptors suspended in `proceed()` are left to unwind on their own.
async fn interruption(cancellation: &CancellationToken, interrupted: &AtomicBool) {
    cancellation.cancelled().await;
    if interrupted.load(Ordering::Acquire) {
        std::future::pending::<()>().await;
    }
}

impl<S: std::fmt::Debug, C> std::fmt::Debug for PipelineContext<'_, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("subject", &self.subject)
            .field("index", &self.index)
            .field("len", &self.interceptors.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
