//! Shared recorder for asserting interceptor order.

use conveyor_core::PipelineResult;
use conveyor_pipeline::{BoxFuture, Interceptor, PipelineContext, SharedInterceptor};
use parking_lot::Mutex;
use std::sync::Arc;

/// An ordered, thread-safe list of trace entries.
///
/// Clones share the same entries, so a trace can be moved into interceptors
/// and inspected from the test afterwards.
#[derive(Debug, Clone, Default)]
pub struct CallTrace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallTrace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns a copy of the entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// An interceptor that records `label` and lets the chain continue.
    #[must_use]
    pub fn marker<S, C>(&self, label: &'static str) -> SharedInterceptor<S, C>
    where
        S: Send + 'static,
        C: Send + 'static,
    {
        Arc::new(TraceInterceptor {
            trace: self.clone(),
            label,
            around: false,
        })
    }

    /// An interceptor that records `label:before`, proceeds, then records
    /// `label:after`.
    #[must_use]
    pub fn around<S, C>(&self, label: &'static str) -> SharedInterceptor<S, C>
    where
        S: Send + 'static,
        C: Send + 'static,
    {
        Arc::new(TraceInterceptor {
            trace: self.clone(),
            label,
            around: true,
        })
    }
}

struct TraceInterceptor {
    trace: CallTrace,
    label: &'static str,
    around: bool,
}

impl<S, C> Interceptor<S, C> for TraceInterceptor
where
    S: Send + 'static,
    C: Send + 'static,
{
    fn name(&self) -> &'static str {
        self.label
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut PipelineContext<'_, S, C>,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        Box::pin(async move {
            if !self.around {
                self.trace.record(self.label);
                return Ok(());
            }
            self.trace.record(format!("{}:before", self.label));
            ctx.proceed().await?;
            self.trace.record(format!("{}:after", self.label));
            Ok(())
        })
    }
}
