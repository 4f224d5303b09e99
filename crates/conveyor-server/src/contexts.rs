//! Call contexts handed to plugin handlers.
//!
//! Each plugin stage gets its own context type over the pipeline it runs
//! in. All of them expose the call, the frozen plugin configuration and
//! `finish()`; the receive and respond contexts add `transform_body`.

use crate::call::ApplicationCall;
use crate::content::OutgoingContent;
use crate::value::{AnyValue, ApplicationReceiveRequest, TypeInfo};
use bytes::Bytes;
use conveyor_core::{PipelineError, PipelineResult};
use conveyor_pipeline::PipelineContext;
use std::future::Future;

/// Type information about the body being transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformBodyContext {
    requested_type: Option<TypeInfo>,
}

impl TransformBodyContext {
    pub(crate) const fn new(requested_type: Option<TypeInfo>) -> Self {
        Self { requested_type }
    }

    /// Returns the type requested by `receive::<T>()`, or the type passed
    /// to `respond(value)`.
    #[must_use]
    pub const fn requested_type(&self) -> Option<TypeInfo> {
        self.requested_type
    }
}

macro_rules! call_context_accessors {
    () => {
        /// Returns the call.
        #[must_use]
        pub fn call(&self) -> &ApplicationCall {
            self.ctx.context()
        }

        /// Returns the call mutably.
        pub fn call_mut(&mut self) -> &mut ApplicationCall {
            self.ctx.context_mut()
        }

        /// Returns the plugin configuration.
        #[must_use]
        pub const fn plugin_config(&self) -> &Config {
            self.config
        }

        /// Stops the current pipeline traversal.
        pub fn finish(&mut self) {
            self.ctx.finish();
        }
    };
}

/// Context of an `on_call` handler, running in the call pipeline's
/// `Plugins` phase.
pub struct OnCallContext<'a, 'c, Config> {
    ctx: &'a mut PipelineContext<'c, (), ApplicationCall>,
    config: &'a Config,
}

impl<'a, 'c, Config> OnCallContext<'a, 'c, Config> {
    pub(crate) fn new(
        ctx: &'a mut PipelineContext<'c, (), ApplicationCall>,
        config: &'a Config,
    ) -> Self {
        Self { ctx, config }
    }

    call_context_accessors!();
}

/// Context of an `on_call_receive` handler, running in the receive
/// pipeline's `Transform` phase.
pub struct OnCallReceiveContext<'a, 'c, Config> {
    ctx: &'a mut PipelineContext<'c, ApplicationReceiveRequest, ApplicationCall>,
    config: &'a Config,
}

impl<'a, 'c, Config> OnCallReceiveContext<'a, 'c, Config> {
    pub(crate) fn new(
        ctx: &'a mut PipelineContext<'c, ApplicationReceiveRequest, ApplicationCall>,
        config: &'a Config,
    ) -> Self {
        Self { ctx, config }
    }

    call_context_accessors!();

    /// Returns the type requested by `receive::<T>()`.
    #[must_use]
    pub fn requested_type(&self) -> TypeInfo {
        self.ctx.subject().type_info
    }

    /// Transforms the raw request body.
    ///
    /// `transform` runs only while the body is still raw `Bytes` and the
    /// requested type is not `Bytes` itself, so the first plugin to
    /// transform the body wins. Returning an [`ApplicationReceiveRequest`]
    /// replaces the whole subject; any other value replaces only the value.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `transform`.
    pub async fn transform_body<F, Fut, T>(&mut self, transform: F) -> PipelineResult<()>
    where
        F: FnOnce(TransformBodyContext, Bytes) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
        T: Send + Sync + 'static,
    {
        let requested = self.ctx.subject().type_info;
        if requested.is::<Bytes>() {
            return Ok(());
        }
        let Some(body) = self.ctx.subject().value.downcast_ref::<Bytes>().cloned() else {
            return Ok(());
        };

        let result = transform(TransformBodyContext::new(Some(requested)), body).await?;
        match AnyValue::flatten(result).downcast::<ApplicationReceiveRequest>() {
            Ok(request) => self.ctx.set_subject(request),
            Err(value) => self.ctx.subject_mut().value = value,
        }
        Ok(())
    }
}

/// Context of an `on_call_respond` handler, running in the send pipeline's
/// `Transform` phase.
pub struct OnCallRespondContext<'a, 'c, Config> {
    ctx: &'a mut PipelineContext<'c, AnyValue, ApplicationCall>,
    config: &'a Config,
}

impl<'a, 'c, Config> OnCallRespondContext<'a, 'c, Config> {
    pub(crate) fn new(
        ctx: &'a mut PipelineContext<'c, AnyValue, ApplicationCall>,
        config: &'a Config,
    ) -> Self {
        Self { ctx, config }
    }

    call_context_accessors!();

    /// Returns the response value.
    #[must_use]
    pub fn subject(&self) -> &AnyValue {
        self.ctx.subject()
    }

    /// Replaces the response value with the result of `transform`.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `transform`.
    pub async fn transform_body<F, Fut, T>(&mut self, transform: F) -> PipelineResult<()>
    where
        F: FnOnce(TransformBodyContext, AnyValue) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
        T: Send + Sync + 'static,
    {
        let requested = self.ctx.context().response().response_type();
        let subject = self.ctx.replace_subject(AnyValue::unit());
        let result = transform(TransformBodyContext::new(requested), subject).await?;
        self.ctx.set_subject(AnyValue::flatten(result));
        Ok(())
    }
}

/// Context of an `on_call_respond_after_transform` handler, running in the
/// send pipeline's `After` phase once the value has been rendered.
pub struct OnCallRespondAfterTransformContext<'a, 'c, Config> {
    ctx: &'a mut PipelineContext<'c, AnyValue, ApplicationCall>,
    config: &'a Config,
}

impl<'a, 'c, Config> OnCallRespondAfterTransformContext<'a, 'c, Config> {
    pub(crate) fn new(
        ctx: &'a mut PipelineContext<'c, AnyValue, ApplicationCall>,
        config: &'a Config,
    ) -> Self {
        Self { ctx, config }
    }

    call_context_accessors!();

    /// Transforms the rendered content.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnexpectedSubject`] if the response value
    /// was not rendered into [`OutgoingContent`], or the error produced by
    /// `transform`.
    pub async fn transform_body<F, Fut>(&mut self, transform: F) -> PipelineResult<()>
    where
        F: FnOnce(TransformBodyContext, OutgoingContent) -> Fut,
        Fut: Future<Output = PipelineResult<OutgoingContent>>,
    {
        let requested = self.ctx.context().response().response_type();
        let subject = self.ctx.replace_subject(AnyValue::unit());
        let content = match subject.downcast::<OutgoingContent>() {
            Ok(content) => content,
            Err(other) => {
                let actual = other.type_name();
                self.ctx.set_subject(other);
                return Err(PipelineError::unexpected_subject("OutgoingContent", actual));
            }
        };

        let content = transform(TransformBodyContext::new(requested), content).await?;
        self.ctx.set_subject(AnyValue::new(content));
        Ok(())
    }
}
