//! Main configuration types.
//!
//! This module provides the top-level [`ConveyorConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{
    ApplicationConfig, ConfigError, LogFormat, LoggingConfig, PipelineConfig, TelemetryConfig,
};

/// Complete Conveyor application configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables. Once handed to an application the value is
/// shared read-only.
///
/// # Example
///
/// ```
/// use conveyor_config::ConveyorConfig;
/// use conveyor_core::DuplicatePluginPolicy;
///
/// let config = ConveyorConfig::default();
/// assert_eq!(config.pipeline.duplicate_plugins, DuplicatePluginPolicy::Reject);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConveyorConfig {
    /// Application identity.
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Pipeline and plugin policies.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Telemetry configuration (metrics, logging).
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ConveyorConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ConveyorConfigBuilder {
        ConveyorConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The application name is empty
    /// - The log level is empty
    /// - Histogram buckets are empty, non-positive, or not strictly increasing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application.name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "application.name",
                "must not be empty",
            ));
        }

        if self.telemetry.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                "must not be empty",
            ));
        }

        let buckets = &self.telemetry.metrics.histogram_buckets;
        if buckets.is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.histogram_buckets",
                "must contain at least one bucket",
            ));
        }
        if buckets.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.histogram_buckets",
                "buckets must be positive and finite",
            ));
        }
        if !buckets.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.histogram_buckets",
                "buckets must be strictly increasing",
            ));
        }

        Ok(())
    }

    /// Development preset: pretty colored logs at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            application: ApplicationConfig {
                environment: "development".to_string(),
                ..Default::default()
            },
            pipeline: PipelineConfig::default(),
            telemetry: TelemetryConfig {
                logging: LoggingConfig {
                    level: "debug".to_string(),
                    format: LogFormat::Pretty,
                    ansi_enabled: true,
                    include_location: true,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// Production preset: JSON logs at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            application: ApplicationConfig {
                environment: "production".to_string(),
                ..Default::default()
            },
            pipeline: PipelineConfig::default(),
            telemetry: TelemetryConfig {
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: LogFormat::Json,
                    ansi_enabled: false,
                    include_location: false,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}

/// Builder for [`ConveyorConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct ConveyorConfigBuilder {
    config: ConveyorConfig,
}

impl ConveyorConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application section.
    pub fn application(mut self, application: ApplicationConfig) -> Self {
        self.config.application = application;
        self
    }

    /// Set the pipeline section.
    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.config.pipeline = pipeline;
        self
    }

    /// Set the telemetry section.
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Build the configuration without validation.
    pub fn build(self) -> ConveyorConfig {
        self.config
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<ConveyorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::{DuplicatePhasePolicy, DuplicatePluginPolicy};

    #[test]
    fn test_default_config_is_valid() {
        let config = ConveyorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.application.name, "conveyor");
    }

    #[test]
    fn test_builder_pipeline() {
        let config = ConveyorConfig::builder()
            .pipeline(PipelineConfig {
                duplicate_phases: DuplicatePhasePolicy::Ignore,
                duplicate_plugins: DuplicatePluginPolicy::Allow,
            })
            .build();

        assert_eq!(config.pipeline.duplicate_phases, DuplicatePhasePolicy::Ignore);
        assert_eq!(config.pipeline.duplicate_plugins, DuplicatePluginPolicy::Allow);
    }

    #[test]
    fn test_validate_empty_name() {
        let config = ConveyorConfig::builder()
            .application(ApplicationConfig {
                name: "  ".to_string(),
                ..Default::default()
            })
            .build();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("application.name"));
    }

    #[test]
    fn test_validate_unsorted_buckets() {
        let mut config = ConveyorConfig::default();
        config.telemetry.metrics.histogram_buckets = vec![0.5, 0.1];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_validate_negative_bucket() {
        let mut config = ConveyorConfig::default();
        config.telemetry.metrics.histogram_buckets = vec![-1.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_development_preset() {
        let config = ConveyorConfig::development();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert!(config.telemetry.logging.ansi_enabled);
    }

    #[test]
    fn test_production_preset() {
        let config = ConveyorConfig::production();
        assert_eq!(config.application.environment, "production");
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_build_validated_failure() {
        let result = ConveyorConfig::builder()
            .telemetry(TelemetryConfig {
                logging: LoggingConfig {
                    level: String::new(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .build_validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml = r#"
            [application]
            name = "orders"

            [pipeline]
            duplicate_plugins = "allow"

            [telemetry.logging]
            format = "pretty"
        "#;

        let config: ConveyorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.application.name, "orders");
        assert_eq!(config.application.environment, "development");
        assert_eq!(config.pipeline.duplicate_plugins, DuplicatePluginPolicy::Allow);
        assert_eq!(config.pipeline.duplicate_phases, DuplicatePhasePolicy::Reject);
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result: Result<ConveyorConfig, _> = toml::from_str("[server]\nport = 80");
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ConveyorConfig::development();
        let text = toml::to_string(&config).unwrap();
        let parsed: ConveyorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
