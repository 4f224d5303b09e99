//! Core interceptor trait and types.
//!
//! This module defines the [`Interceptor`] trait that every pipeline handler
//! implements. An interceptor receives the [`PipelineContext`] of one
//! traversal; it may inspect or replace the subject, call
//! [`proceed`](PipelineContext::proceed) to run the rest of the chain and
//! resume afterwards, [`finish`](PipelineContext::finish) the traversal, or
//! return an error.
//!
//! # Example
//!
//! ```ignore
//! use conveyor_pipeline::{BoxFuture, Interceptor, PipelineContext};
//! use conveyor_core::PipelineResult;
//!
//! struct Timing;
//!
//! impl Interceptor<String, Vec<String>> for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn intercept<'a>(
//!         &'a self,
//!         ctx: &'a mut PipelineContext<'_, String, Vec<String>>,
//!     ) -> BoxFuture<'a, PipelineResult<()>> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             ctx.proceed().await?;
//!             ctx.context_mut().push(format!("took {:?}", start.elapsed()));
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::context::PipelineContext;
use conveyor_core::PipelineResult;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler registered against a pipeline phase.
///
/// `S` is the subject type flowing through the pipeline and `C` the call
/// type the traversal is bound to.
///
/// # Contract
///
/// - Returning without calling `proceed()` lets the traversal continue with
///   the next interceptor once this one returns.
/// - Calling `proceed()` runs every remaining interceptor, then resumes here.
/// - Returning an error terminates the traversal and surfaces at the
///   `proceed()` call site of the enclosing interceptor.
pub trait Interceptor<S, C>: Send + Sync + 'static {
    /// Returns the name of this interceptor, used in logs.
    fn name(&self) -> &'static str {
        "interceptor"
    }

    /// Runs this interceptor for one traversal.
    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, S, C>,
    ) -> BoxFuture<'a, PipelineResult<()>>;
}

/// An interceptor created from a closure.
///
/// # Example
///
/// ```ignore
/// let interceptor = FnInterceptor::new("logging", |ctx| {
///     Box::pin(async move {
///         tracing::info!(subject = ?ctx.subject(), "Before");
///         ctx.proceed().await
///     })
/// });
/// ```
pub struct FnInterceptor<F> {
    name: &'static str,
    func: F,
}

impl<F> FnInterceptor<F> {
    /// Creates a new closure-based interceptor.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<S, C, F> Interceptor<S, C> for FnInterceptor<F>
where
    S: Send + 'static,
    C: Send + 'static,
    F: for<'a, 'c> Fn(&'a mut PipelineContext<'c, S, C>) -> BoxFuture<'a, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, S, C>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        (self.func)(ctx)
    }
}

impl<F> std::fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInterceptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
