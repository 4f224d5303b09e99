//! Per-call telemetry plugin.
//!
//! Installs three hooks: `CallStarted` stamps the start time into the call
//! attributes, `CallFailed` counts the failure and remembers the error
//! status, and `CallCompleted` records the handling time and logs one line
//! per call.

use crate::metrics::{record_call_failure, record_call_handled};
use conveyor_core::AttributeKey;
use conveyor_server::{
    call_failed_handler, call_handler, create_application_plugin, ApplicationPlugin, CallCompleted,
    CallFailed, CallStarted,
};
use std::time::Instant;
use tracing::{info, warn};

/// Key of the call telemetry plugin.
pub const CALL_TELEMETRY: &str = "CallTelemetry";

const CALL_STARTED_AT: AttributeKey<Instant> = AttributeKey::new("CallStartedAt");
const CALL_FAILED_STATUS: AttributeKey<u16> = AttributeKey::new("CallFailedStatus");

/// Configuration of the call telemetry plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTelemetryConfig {
    /// Log one line per completed call and one per failure.
    pub log_calls: bool,
    /// Record handling time and failure metrics.
    pub record_metrics: bool,
}

impl Default for CallTelemetryConfig {
    fn default() -> Self {
        Self {
            log_calls: true,
            record_metrics: true,
        }
    }
}

/// Creates the call telemetry plugin.
#[must_use]
pub fn call_telemetry() -> ApplicationPlugin<CallTelemetryConfig> {
    create_application_plugin(CALL_TELEMETRY, CallTelemetryConfig::default, |builder| {
        let config = *builder.plugin_config();

        builder.on(
            CallStarted,
            call_handler(|call| {
                Box::pin(async move {
                    call.attributes_mut().put(&CALL_STARTED_AT, Instant::now());
                    Ok(())
                })
            }),
        );

        // Registered before `CallFailed` so it wraps it and runs last.
        builder.on(
            CallCompleted,
            call_handler(move |call| {
                Box::pin(async move {
                    let Some(started) = call.attributes_mut().take_or_none(&CALL_STARTED_AT) else {
                        return Ok(());
                    };
                    let duration = started.elapsed();
                    let status = call
                        .response()
                        .status()
                        .map(|s| s.as_u16())
                        .or_else(|| call.attributes().get_or_none(&CALL_FAILED_STATUS).copied())
                        .unwrap_or(0);

                    if config.record_metrics {
                        record_call_handled(status, duration);
                    }
                    if config.log_calls {
                        info!(
                            call_id = %call.id(),
                            method = %call.request().method(),
                            path = call.request().path(),
                            status,
                            duration_ms = duration.as_secs_f64() * 1000.0,
                            "Call handled"
                        );
                    }
                    Ok(())
                })
            }),
        );

        builder.on(
            CallFailed,
            call_failed_handler(move |call, err| {
                Box::pin(async move {
                    call.attributes_mut()
                        .put(&CALL_FAILED_STATUS, err.status_code().as_u16());
                    if config.record_metrics {
                        record_call_failure(err.code());
                    }
                    if config.log_calls {
                        warn!(call_id = %call.id(), code = err.code(), error = %err, "Call failed");
                    }
                    Ok(())
                })
            }),
        );
    })
}
