//! The transport-facing entry point.
//!
//! A transport hands each request to [`ApplicationEngine::handle`] (usually
//! one task per request) and writes the response from the returned
//! [`CallOutcome`].

use crate::application::Application;
use crate::call::{ApplicationCall, ApplicationResponse};
use crate::content::OutgoingContent;
use crate::lifecycle::{
    CallTracker, EngineState, StateCell, APPLICATION_STARTED, APPLICATION_STARTING,
    APPLICATION_STOPPED, APPLICATION_STOPPING, APPLICATION_STOP_PREPARING,
};
use bytes::Bytes;
use conveyor_core::{PipelineError, PipelineResult};
use conveyor_pipeline::{CancellationToken, PipelineOutcome};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Counter of processed calls, labelled by `outcome`.
pub const CALLS_TOTAL: &str = "conveyor_calls_total";

/// Histogram of call durations in seconds, labelled by `outcome`.
pub const CALL_DURATION_SECONDS: &str = "conveyor_call_duration_seconds";

/// Gauge of calls currently in flight.
pub const CALLS_IN_FLIGHT: &str = "conveyor_calls_in_flight";

/// How a call ended.
#[derive(Debug)]
pub enum CallStatus {
    /// Every interceptor of the call pipeline ran.
    Completed,
    /// An interceptor finished the call early.
    Finished,
    /// An error escaped the call pipeline.
    Failed(PipelineError),
}

impl CallStatus {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Finished => "finished",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns the error if the call failed.
    #[must_use]
    pub const fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// A processed call and how it ended.
#[derive(Debug)]
pub struct CallOutcome {
    call: ApplicationCall,
    status: CallStatus,
    duration: Duration,
}

impl CallOutcome {
    /// Returns the processed call.
    #[must_use]
    pub const fn call(&self) -> &ApplicationCall {
        &self.call
    }

    /// Returns how the call ended.
    #[must_use]
    pub const fn status(&self) -> &CallStatus {
        &self.status
    }

    /// Returns the wall time spent in the call pipeline.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns `true` if the call did not fail.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.status, CallStatus::Failed(_))
    }

    /// Consumes the outcome, returning the call and its status.
    #[must_use]
    pub fn into_parts(self) -> (ApplicationCall, CallStatus) {
        (self.call, self.status)
    }

    /// Consumes the outcome, returning the call response.
    #[must_use]
    pub fn into_response(self) -> ApplicationResponse {
        self.call.into_response()
    }

    /// Consumes the outcome, returning an `http::Response` for the transport.
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        self.into_response().into_http()
    }
}

/// Drives calls through an [`Application`].
#[derive(Debug)]
pub struct ApplicationEngine {
    application: Arc<Application>,
    state: StateCell,
    tracker: CallTracker,
    grace_period: Duration,
}

impl ApplicationEngine {
    /// Default time `stop` waits for in-flight calls.
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

    /// Creates an engine for a fully installed application.
    #[must_use]
    pub fn new(application: Application) -> Self {
        Self {
            application: Arc::new(application),
            state: StateCell::new(),
            tracker: CallTracker::new(),
            grace_period: Self::DEFAULT_GRACE_PERIOD,
        }
    }

    /// Sets how long `stop` waits for in-flight calls.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Returns the application.
    #[must_use]
    pub const fn application(&self) -> &Arc<Application> {
        &self.application
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Returns the number of calls in flight.
    #[must_use]
    pub fn active_calls(&self) -> usize {
        self.tracker.active_calls()
    }

    /// Starts the engine, raising the start events.
    ///
    /// Returns `false` if the engine was already started or stopped.
    pub fn start(&self) -> bool {
        // Only the caller that wins the transition raises the start events.
        if !self.state.transition(EngineState::Created, EngineState::Running) {
            return false;
        }
        let application: &Application = &self.application;
        application.monitor().raise(&APPLICATION_STARTING, application);
        application.monitor().raise(&APPLICATION_STARTED, application);
        info!(application = self.application.environment().name(), "Application started");
        true
    }

    /// Stops the engine: refuses new calls, waits up to the grace period for
    /// in-flight calls, and raises the stop events.
    ///
    /// Returns `false` if the engine was already stopped.
    pub async fn stop(&self) -> bool {
        let stopped = self.state.transition(EngineState::Running, EngineState::Stopped)
            || self.state.transition(EngineState::Created, EngineState::Stopped);
        if !stopped {
            return false;
        }

        let application: &Application = &self.application;
        application.monitor().raise(&APPLICATION_STOP_PREPARING, application);
        application.monitor().raise(&APPLICATION_STOPPING, application);

        let in_flight = self.tracker.active_calls();
        if in_flight > 0 {
            debug!(in_flight, "Waiting for in-flight calls");
            if tokio::time::timeout(self.grace_period, self.tracker.wait_idle())
                .await
                .is_err()
            {
                warn!(
                    remaining = self.tracker.active_calls(),
                    "Grace period elapsed with calls still in flight"
                );
            }
        }

        application.monitor().raise(&APPLICATION_STOPPED, application);
        info!(application = self.application.environment().name(), "Application stopped");
        true
    }

    /// Processes one request.
    pub async fn handle(&self, request: http::Request<Bytes>) -> CallOutcome {
        self.handle_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Processes one request; cancelling `cancellation` interrupts the
    /// running interceptor and fails the call with
    /// [`PipelineError::Cancelled`].
    pub async fn handle_with_cancellation(
        &self,
        request: http::Request<Bytes>,
        cancellation: CancellationToken,
    ) -> CallOutcome {
        let mut call = ApplicationCall::new(
            Arc::clone(&self.application),
            request,
            cancellation.clone(),
        );
        let span = info_span!(
            "call",
            call_id = %call.id(),
            method = %call.request().method(),
            path = call.request().path(),
        );

        let started = Instant::now();
        let result = if self.state() == EngineState::Stopped {
            warn!(parent: &span, "Engine stopped, refusing call");
            Err(PipelineError::Cancelled)
        } else {
            let _guard = self.tracker.acquire();
            self.application
                .call_pipeline()
                .execute_with_cancellation(&mut call, (), cancellation)
                .instrument(span.clone())
                .await
        };
        let duration = started.elapsed();

        let status = span.in_scope(|| Self::settle(&mut call, result));
        counter!(CALLS_TOTAL, "outcome" => status.label()).increment(1);
        histogram!(CALL_DURATION_SECONDS, "outcome" => status.label()).record(duration.as_secs_f64());

        CallOutcome {
            call,
            status,
            duration,
        }
    }

    fn settle(call: &mut ApplicationCall, result: PipelineResult<PipelineOutcome<()>>) -> CallStatus {
        match result {
            Ok(PipelineOutcome::Completed(())) => {
                debug!(outcome = "completed", "Call completed");
                CallStatus::Completed
            }
            Ok(PipelineOutcome::Finished(())) => {
                debug!(outcome = "finished", "Call finished early");
                CallStatus::Finished
            }
            Err(err) => {
                if err.is_cancelled() {
                    warn!(outcome = "failed", code = err.code(), "Call cancelled");
                } else {
                    error!(outcome = "failed", code = err.code(), error = %err, "Call failed");
                }
                if !call.response().is_committed() {
                    // Nothing was committed yet, so this cannot fail.
                    let _ = call
                        .response_mut()
                        .commit(OutgoingContent::status_only(err.status_code()));
                }
                CallStatus::Failed(err)
            }
        }
    }
}
