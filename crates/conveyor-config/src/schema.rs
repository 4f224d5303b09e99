//! Configuration section types.

use conveyor_core::{DuplicatePhasePolicy, DuplicatePluginPolicy};
use serde::{Deserialize, Serialize};

/// Application identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    /// Application name, attached to logs and metrics.
    #[serde(default = "default_application_name")]
    pub name: String,

    /// Deployment environment (e.g. "development", "production").
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_application_name(),
            environment: default_environment(),
        }
    }
}

/// Policies applied while building pipelines and installing plugins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// What happens when a phase is registered twice.
    #[serde(default)]
    pub duplicate_phases: DuplicatePhasePolicy,

    /// What happens when a plugin key is installed twice.
    #[serde(default)]
    pub duplicate_plugins: DuplicatePluginPolicy,
}

/// Telemetry settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether call metrics are recorded.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bucket boundaries, in seconds, for call duration histograms.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (structured).
    #[default]
    Json,
    /// Human-readable format.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Whether logging is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level filter (`tracing_subscriber::EnvFilter` syntax).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Enable ANSI colors (only for pretty format).
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include file and line number in log output.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_application_name() -> String {
    "conveyor".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_defaults_reject() {
        let config = PipelineConfig::default();
        assert_eq!(config.duplicate_phases, DuplicatePhasePolicy::Reject);
        assert_eq!(config.duplicate_plugins, DuplicatePluginPolicy::Reject);
    }

    #[test]
    fn test_log_format_lowercase() {
        let format: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(format, LogFormat::Pretty);
        assert_eq!(serde_json::to_string(&LogFormat::Json).unwrap(), "\"json\"");
    }

    #[test]
    fn test_metrics_default_buckets_sorted() {
        let buckets = MetricsConfig::default().histogram_buckets;
        assert!(buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_logging_partial_section() {
        let logging: LoggingConfig = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(logging.level, "debug");
        assert!(logging.enabled);
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("duplicate_routes = \"allow\"");
        assert!(result.is_err());
    }
}
