//! # Conveyor Config
//!
//! Typed configuration for Conveyor applications.
//!
//! ## Configuration Sources
//!
//! Configuration is loaded in layers, with later sources overriding earlier ones:
//!
//! 1. **Defaults**: built-in default values
//! 2. **File**: TOML or JSON configuration file
//! 3. **Environment**: environment variables with a prefix
//!
//! ## File Format
//!
//! ```toml
//! [application]
//! name = "orders"
//! environment = "production"
//!
//! [pipeline]
//! duplicate_phases = "reject"   # or "ignore"
//! duplicate_plugins = "reject"  # or "allow"
//!
//! [telemetry.metrics]
//! enabled = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! ## Environment Variables
//!
//! Variables use the format `PREFIX__SECTION__KEY`:
//!
//! - `CONVEYOR__APPLICATION__NAME=orders`
//! - `CONVEYOR__PIPELINE__DUPLICATE_PLUGINS=allow`
//! - `CONVEYOR__TELEMETRY__LOGGING__LEVEL=debug`
//!
//! Unknown fields in files are rejected; unknown environment keys are ignored.

#![doc(html_root_url = "https://docs.rs/conveyor-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{ConveyorConfig, ConveyorConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    ApplicationConfig, LogFormat, LoggingConfig, MetricsConfig, PipelineConfig, TelemetryConfig,
};
