//! Prometheus metrics for Conveyor.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `conveyor_calls_total` | Counter | `outcome` | Calls processed by the engine |
//! | `conveyor_call_duration_seconds` | Histogram | `outcome` | Engine-side call latency |
//! | `conveyor_calls_in_flight` | Gauge | - | Calls currently being processed |
//! | `conveyor_call_handling_seconds` | Histogram | `status` | Latency measured by the call telemetry plugin |
//! | `conveyor_call_failures_total` | Counter | `code` | Failed calls by error code |
//!
//! The first three are emitted by the engine; the last two by
//! [`call_telemetry`](crate::call_telemetry).
//!
//! # Example
//!
//! ```rust,ignore
//! use conveyor_config::MetricsConfig;
//! use conveyor_telemetry::metrics::{init_metrics, render_metrics};
//!
//! init_metrics(&MetricsConfig::default())?;
//! let text = render_metrics().unwrap_or_default();
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use conveyor_config::MetricsConfig;
use conveyor_server::{CALLS_IN_FLIGHT, CALLS_TOTAL, CALL_DURATION_SECONDS};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::OnceLock;
use std::time::Duration;

/// Histogram of call handling time, recorded by the call telemetry plugin.
pub const CALL_HANDLING_SECONDS: &str = "conveyor_call_handling_seconds";

/// Counter of failed calls, recorded by the call telemetry plugin.
pub const CALL_FAILURES_TOTAL: &str = "conveyor_call_failures_total";

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Renders the metrics of one recorder in Prometheus format.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with the given handle.
    #[must_use]
    pub const fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Returns the registry of the global recorder, if installed.
    #[must_use]
    pub fn global() -> Option<Self> {
        METRICS_HANDLE.get().cloned().map(Self::new)
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Builds a Prometheus recorder without installing it.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` if the histogram buckets are
/// rejected by the exporter.
pub fn build_recorder(config: &MetricsConfig) -> TelemetryResult<PrometheusRecorder> {
    let builder = PrometheusBuilder::new()
        .set_buckets(&config.histogram_buckets)
        .map_err(|e| TelemetryError::InvalidConfig(format!("histogram buckets: {e}")))?;
    Ok(builder.build_recorder())
}

/// Installs the global Prometheus recorder.
///
/// Calling this again after a successful installation is a no-op.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for rejected buckets and
/// `TelemetryError::MetricsInit` if another global recorder is installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&config.histogram_buckets)
        .map_err(|e| TelemetryError::InvalidConfig(format!("histogram buckets: {e}")))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    describe_metrics();

    Ok(())
}

/// Returns the global metrics handle if initialized.
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for all standard metrics on the current recorder.
pub fn describe_metrics() {
    describe_counter!(CALLS_TOTAL, "Total number of calls processed by the engine");
    describe_histogram!(
        CALL_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Call duration measured by the engine"
    );
    describe_gauge!(CALLS_IN_FLIGHT, "Number of calls currently being processed");
    describe_histogram!(
        CALL_HANDLING_SECONDS,
        metrics::Unit::Seconds,
        "Time from call start to completion, by response status"
    );
    describe_counter!(CALL_FAILURES_TOTAL, "Failed calls by error code");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Records the handling time of a call.
pub fn record_call_handled(status: u16, duration: Duration) {
    histogram!(CALL_HANDLING_SECONDS, "status" => status.to_string()).record(duration.as_secs_f64());
}

/// Records a failed call.
pub fn record_call_failure(code: &'static str) {
    counter!(CALL_FAILURES_TOTAL, "code" => code).increment(1);
}
