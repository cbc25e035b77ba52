//! Configuration file support for reagg
//!
//! Supports both YAML and TOML configuration files.
//!
//! # Example YAML configuration:
//! ```yaml
//! # Sliding window: 20s of history, a result every 5s
//! window:
//!   size_ms: 20000
//!   slide_ms: 5000
//!
//! aggregator:
//!   operator: avg
//!   field: value
//!
//! generator:
//!   events_per_second: 1000
//!   mode: incremental
//!
//! logging:
//!   level: info
//!   format: json
//! ```

use reagg_runtime::{
    AggregatorConfig, GeneratorConfig, GeneratorMode, OperatorKind, PipelineConfig, WindowConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Sliding window timing
    pub window: WindowSection,

    /// Aggregator buffer and operator selection
    pub aggregator: AggregatorSection,

    /// Synthetic event generator
    pub generator: GeneratorSection,

    /// Where window results go
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSection {
    /// Age after which an event leaves the window
    pub size_ms: u64,

    /// Interval between two results
    pub slide_ms: u64,

    /// Timer resolution
    pub tick_ms: u64,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            size_ms: 20_000,
            slide_ms: 5_000,
            tick_ms: 10,
        }
    }
}

/// Aggregator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSection {
    /// Leaf slots allocated up front (power of two)
    pub initial_capacity: usize,

    /// Shrink floor (power of two)
    pub min_capacity: usize,

    /// Aggregation operator
    pub operator: OperatorKind,

    /// Event field aggregated by every operator except `count`
    pub field: String,

    /// Field reported by `arg_max`
    pub arg_field: String,
}

impl Default for AggregatorSection {
    fn default() -> Self {
        Self {
            initial_capacity: 4,
            min_capacity: 1,
            operator: OperatorKind::Count,
            field: "value".to_string(),
            arg_field: "id".to_string(),
        }
    }
}

/// Event generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSection {
    /// Target event rate
    pub events_per_second: u32,

    /// Stream shape (random, incremental)
    pub mode: GeneratorMode,

    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,

    /// How long the generator runs
    pub duration_secs: u64,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            events_per_second: 10_000,
            mode: GeneratorMode::Random,
            seed: None,
            duration_secs: 60,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Console format (text, json)
    pub format: String,

    /// Also append results as JSON lines to this file
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML, auto-detected by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content)?,
            "toml" => Self::from_toml(&content)?,
            _ => {
                // Try YAML first, then TOML
                Self::from_yaml(&content).or_else(|_| Self::from_toml(&content))?
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Merge another config into this one (other values take precedence if set)
    pub fn merge(&mut self, other: Config) {
        let window = WindowSection::default();
        if other.window.size_ms != window.size_ms {
            self.window.size_ms = other.window.size_ms;
        }
        if other.window.slide_ms != window.slide_ms {
            self.window.slide_ms = other.window.slide_ms;
        }
        if other.window.tick_ms != window.tick_ms {
            self.window.tick_ms = other.window.tick_ms;
        }

        let aggregator = AggregatorSection::default();
        if other.aggregator.initial_capacity != aggregator.initial_capacity {
            self.aggregator.initial_capacity = other.aggregator.initial_capacity;
        }
        if other.aggregator.min_capacity != aggregator.min_capacity {
            self.aggregator.min_capacity = other.aggregator.min_capacity;
        }
        if other.aggregator.operator != aggregator.operator {
            self.aggregator.operator = other.aggregator.operator;
        }
        if other.aggregator.field != aggregator.field {
            self.aggregator.field = other.aggregator.field;
        }
        if other.aggregator.arg_field != aggregator.arg_field {
            self.aggregator.arg_field = other.aggregator.arg_field;
        }

        let generator = GeneratorSection::default();
        if other.generator.events_per_second != generator.events_per_second {
            self.generator.events_per_second = other.generator.events_per_second;
        }
        if other.generator.mode != generator.mode {
            self.generator.mode = other.generator.mode;
        }
        if other.generator.seed.is_some() {
            self.generator.seed = other.generator.seed;
        }
        if other.generator.duration_secs != generator.duration_secs {
            self.generator.duration_secs = other.generator.duration_secs;
        }

        if other.output.format != OutputConfig::default().format {
            self.output.format = other.output.format;
        }
        if other.output.file.is_some() {
            self.output.file = other.output.file;
        }

        let logging = LoggingConfig::default();
        if other.logging.level != logging.level {
            self.logging.level = other.logging.level;
        }
        if other.logging.format != logging.format {
            self.logging.format = other.logging.format;
        }
    }

    /// Reject settings the runtime would refuse to start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.generator.events_per_second == 0 {
            return Err(ConfigError::Invalid(
                "generator.events_per_second must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("output.format", &self.output.format),
            ("logging.format", &self.logging.format),
        ] {
            if value != "text" && value != "json" {
                return Err(ConfigError::Invalid(format!(
                    "{} must be 'text' or 'json', got '{}'",
                    name, value
                )));
            }
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Runtime pipeline settings described by this configuration
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            window: WindowConfig {
                size: Duration::from_millis(self.window.size_ms),
                slide: Duration::from_millis(self.window.slide_ms),
                tick: Duration::from_millis(self.window.tick_ms),
            },
            aggregator: AggregatorConfig {
                initial_capacity: self.aggregator.initial_capacity,
                min_capacity: self.aggregator.min_capacity,
            },
            ..Default::default()
        }
    }

    /// Generator settings described by this configuration
    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig {
            events_per_second: self.generator.events_per_second,
            mode: self.generator.mode,
            seed: self.generator.seed,
            ..Default::default()
        }
    }

    /// Create an example configuration
    pub fn example() -> Self {
        Self {
            window: WindowSection::default(),
            aggregator: AggregatorSection {
                operator: OperatorKind::Avg,
                ..Default::default()
            },
            generator: GeneratorSection {
                events_per_second: 1000,
                mode: GeneratorMode::Incremental,
                seed: Some(42),
                duration_secs: 30,
            },
            output: OutputConfig {
                format: "text".to_string(),
                file: Some(PathBuf::from("results.jsonl")),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }

    /// Generate example YAML configuration
    pub fn example_yaml() -> String {
        serde_yaml::to_string(&Self::example()).unwrap_or_default()
    }

    /// Generate example TOML configuration
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Self::example()).unwrap_or_default()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.size_ms, 20_000);
        assert_eq!(config.window.slide_ms, 5_000);
        assert_eq!(config.aggregator.operator, OperatorKind::Count);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
window:
  size_ms: 1000
  slide_ms: 250
aggregator:
  operator: arg_max
  arg_field: sensor
generator:
  mode: incremental
  seed: 9
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.window.size_ms, 1000);
        assert_eq!(config.window.slide_ms, 250);
        assert_eq!(config.window.tick_ms, 10);
        assert_eq!(config.aggregator.operator, OperatorKind::ArgMax);
        assert_eq!(config.aggregator.arg_field, "sensor");
        assert_eq!(config.generator.mode, GeneratorMode::Incremental);
        assert_eq!(config.generator.seed, Some(9));
    }

    #[test]
    fn test_toml_parsing() {
        let toml = r#"
[window]
size_ms = 1000

[aggregator]
operator = "max"
field = "temperature"

[logging]
level = "debug"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.window.size_ms, 1000);
        assert_eq!(config.aggregator.operator, OperatorKind::Max);
        assert_eq!(config.aggregator.field, "temperature");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let override_config = Config {
            window: WindowSection {
                slide_ms: 100,
                ..Default::default()
            },
            ..Default::default()
        };

        base.merge(override_config);
        assert_eq!(base.window.slide_ms, 100);
        assert_eq!(base.window.size_ms, 20_000);
    }

    #[test]
    fn test_pipeline_conversion() {
        let mut config = Config::default();
        config.aggregator.initial_capacity = 16;
        let pipeline = config.pipeline();
        assert_eq!(pipeline.window.size, Duration::from_secs(20));
        assert_eq!(pipeline.window.tick, Duration::from_millis(10));
        assert_eq!(pipeline.aggregator.initial_capacity, 16);
    }

    #[test]
    fn test_validate_rejects_bad_capacity() {
        let mut config = Config::default();
        config.aggregator.initial_capacity = 6;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
