//! Observability for Conveyor applications.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//! - **Call telemetry**: a plugin that measures and logs every call
//!
//! # Example
//!
//! ```rust,ignore
//! use conveyor_config::ConfigLoader;
//! use conveyor_server::Application;
//! use conveyor_telemetry::{call_telemetry, init_telemetry};
//!
//! let config = ConfigLoader::new().with_env_prefix("CONVEYOR").load()?;
//! let registry = init_telemetry(&config.telemetry)?;
//!
//! let mut application = Application::with_config(config)?;
//! application.install_default(&call_telemetry())?;
//!
//! if let Some(registry) = registry {
//!     println!("{}", registry.render());
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/conveyor-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;
mod plugin;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use crate::metrics::{init_metrics, MetricsRegistry};
pub use plugin::{call_telemetry, CallTelemetryConfig, CALL_TELEMETRY};

use conveyor_config::TelemetryConfig;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and metrics from configuration.
///
/// Returns the registry of the global Prometheus recorder when metrics are
/// enabled.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    init_logging(&LogConfig::from(&config.logging))?;

    if !config.metrics.enabled {
        return Ok(None);
    }
    init_metrics(&config.metrics)?;

    Ok(MetricsRegistry::global())
}
