//! Layered configuration loading.
//!
//! Layers apply in order, later layers overriding earlier ones:
//! 1. Default values (built into the code)
//! 2. Configuration file (TOML or JSON)
//! 3. Environment variables

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use conveyor_core::{DuplicatePhasePolicy, DuplicatePluginPolicy};

use crate::{ConfigError, ConveyorConfig, LogFormat};

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use conveyor_config::ConfigLoader;
///
/// # fn main() -> Result<(), conveyor_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("conveyor.toml")?
///     .with_env_prefix("CONVEYOR")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ConveyorConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ConveyorConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Reset to default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = ConveyorConfig::default();
        self
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ConveyorConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ConveyorConfig::production();
        self
    }

    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has an
    /// unsupported extension, or fails to parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let file_config = Self::parse_file(&content, path)?;
        self.merge_config(file_config);
        self.file_loaded = true;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`"toml"` or `"json"`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the format is unsupported or parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use conveyor_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [application]
    ///     name = "orders"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.application.name, "orders");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let file_config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::unsupported_format(format)),
        };

        self.merge_config(file_config);
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `CONVEYOR__PIPELINE__DUPLICATE_PLUGINS=allow`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if present.
    ///
    /// # Errors
    ///
    /// Currently infallible; a missing `.env` file is not an error.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(self)
    }

    /// Returns `true` if a configuration file was loaded.
    #[must_use]
    pub const fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Apply environment overrides, validate, and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment variable fails to parse or
    /// validation fails.
    pub fn load(mut self) -> Result<ConveyorConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ConveyorConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<ConveyorConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::unsupported_format(path.display().to_string())),
        }
    }

    // Sections carry serde defaults, so a file replaces the base config and
    // anything it leaves out falls back to the built-in default.
    fn merge_config(&mut self, file_config: ConveyorConfig) {
        self.config = file_config;
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            // Application section
            ["APPLICATION", "NAME"] => {
                self.config.application.name = value.to_string();
            }
            ["APPLICATION", "ENVIRONMENT"] => {
                self.config.application.environment = value.to_string();
            }

            // Pipeline section
            ["PIPELINE", "DUPLICATE_PHASES"] => {
                self.config.pipeline.duplicate_phases = match value.to_lowercase().as_str() {
                    "reject" => DuplicatePhasePolicy::Reject,
                    "ignore" => DuplicatePhasePolicy::Ignore,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'reject' or 'ignore'",
                        ))
                    }
                };
            }
            ["PIPELINE", "DUPLICATE_PLUGINS"] => {
                self.config.pipeline.duplicate_plugins = match value.to_lowercase().as_str() {
                    "reject" => DuplicatePluginPolicy::Reject,
                    "allow" => DuplicatePluginPolicy::Allow,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'reject' or 'allow'",
                        ))
                    }
                };
            }

            // Telemetry metrics
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                self.config.telemetry.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "METRICS", "HISTOGRAM_BUCKETS"] => {
                self.config.telemetry.metrics.histogram_buckets = value
                    .split(',')
                    .map(|b| b.trim().parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| {
                        ConfigError::env_parse_error(key, "expected comma-separated floats")
                    })?;
            }

            // Telemetry logging
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                self.config.telemetry.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                self.config.telemetry.logging.ansi_enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                self.config.telemetry.logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            // Unknown keys are ignored
            _ => {}
        }

        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, ConveyorConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"pipeline": {"duplicate_phases": "ignore"}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.pipeline.duplicate_phases, DuplicatePhasePolicy::Ignore);
    }

    #[test]
    fn test_loader_with_string_unsupported() {
        let result = ConfigLoader::new().with_string("name: x", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[application]\nname = \"billing\"").unwrap();

        let loader = ConfigLoader::new().with_file(file.path()).unwrap();
        assert!(loader.file_loaded());

        let config = loader.load().unwrap();
        assert_eq!(config.application.name, "billing");
    }

    #[test]
    fn test_loader_missing_file() {
        let result = ConfigLoader::new().with_file("/nonexistent/conveyor.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_optional_missing_file() {
        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/conveyor.toml")
            .unwrap();
        assert!(!loader.file_loaded());
    }

    #[test]
    fn test_loader_invalid_file_fails_validation() {
        let result = ConfigLoader::new()
            .with_string("[application]\nname = \"\"", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_env_override_duplicate_plugins() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__PIPELINE__DUPLICATE_PLUGINS", "allow", "TEST")
            .unwrap();
        assert_eq!(
            loader.config.pipeline.duplicate_plugins,
            DuplicatePluginPolicy::Allow
        );
    }

    #[test]
    fn test_env_override_invalid_phase_policy() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__PIPELINE__DUPLICATE_PHASES", "merge", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_env_override_logging() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__LEVEL", "trace", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__ANSI_ENABLED", "yes", "TEST")
            .unwrap();
        assert_eq!(loader.config.telemetry.logging.level, "trace");
        assert!(loader.config.telemetry.logging.ansi_enabled);
    }

    #[test]
    fn test_env_override_buckets() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__TELEMETRY__METRICS__HISTOGRAM_BUCKETS", "0.1, 1, 10", "TEST")
            .unwrap();
        assert_eq!(
            loader.config.telemetry.metrics.histogram_buckets,
            vec![0.1, 1.0, 10.0]
        );
    }

    #[test]
    fn test_env_override_invalid_bool() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__TELEMETRY__METRICS__ENABLED", "maybe", "TEST");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__HTTP_ADDR", "0.0.0.0:80", "TEST")
            .unwrap();
        assert_eq!(loader.config, ConveyorConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("sometimes"), None);
    }
}
