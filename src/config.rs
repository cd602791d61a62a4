//! Configuration for the training stream.
//!
//! Defaults follow the controller's long-standing conventions: up to 20000
//! epochs, a 0.005 average-error stopping threshold, and log/progress
//! cadences of every 10 epochs. All fields have serde defaults, so a partial
//! TOML file (or an empty one) deserializes into a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainStreamError};

fn default_iterations() -> usize {
    20_000
}

fn default_error_thresh() -> f64 {
    0.005
}

fn default_log_mode() -> LogMode {
    LogMode::Off
}

fn default_log_period() -> usize {
    10
}

fn default_callback_period() -> usize {
    10
}

/// Where cadence-gated epoch log lines go.
///
/// A custom sink closure can be attached on the stream itself with
/// [`TrainStream::with_log_sink`](crate::TrainStream::with_log_sink), which
/// overrides this mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// No periodic log output.
    Off,
    /// Emit log lines through `tracing::info!`.
    Tracing,
}

impl Default for LogMode {
    fn default() -> Self {
        default_log_mode()
    }
}

/// Configuration for a [`TrainStream`](crate::TrainStream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainStreamConfig {
    /// Maximum number of training epochs after shape determination.
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Stop once the average epoch error falls at or below this threshold.
    #[serde(default = "default_error_thresh")]
    pub error_thresh: f64,

    /// Periodic log output mode.
    #[serde(default = "default_log_mode")]
    pub log: LogMode,

    /// Epochs between log emissions.
    #[serde(default = "default_log_period")]
    pub log_period: usize,

    /// Epochs between progress-callback invocations.
    #[serde(default = "default_callback_period")]
    pub callback_period: usize,

    /// Explicit hidden-layer sizes. `None` derives a single layer of
    /// `max(3, input_size / 2)` units at shape determination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_layers: Option<Vec<usize>>,
}

impl Default for TrainStreamConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            error_thresh: default_error_thresh(),
            log: default_log_mode(),
            log_period: default_log_period(),
            callback_period: default_callback_period(),
            hidden_layers: None,
        }
    }
}

impl TrainStreamConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> TrainStreamConfigBuilder {
        TrainStreamConfigBuilder::default()
    }

    /// Check the configuration for values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(TrainStreamError::invalid_config(
                "iterations must be at least 1",
            ));
        }
        if !self.error_thresh.is_finite() || self.error_thresh < 0.0 {
            return Err(TrainStreamError::invalid_config(
                "error_thresh must be finite and non-negative",
            ));
        }
        if self.log_period == 0 {
            return Err(TrainStreamError::invalid_config(
                "log_period must be at least 1",
            ));
        }
        if self.callback_period == 0 {
            return Err(TrainStreamError::invalid_config(
                "callback_period must be at least 1",
            ));
        }
        if let Some(sizes) = &self.hidden_layers {
            if sizes.iter().any(|&s| s == 0) {
                return Err(TrainStreamError::invalid_config(
                    "hidden layers must have at least one unit each",
                ));
            }
        }
        Ok(())
    }

    /// Load a configuration from a TOML file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Builder for [`TrainStreamConfig`].
#[derive(Debug, Default)]
pub struct TrainStreamConfigBuilder {
    iterations: Option<usize>,
    error_thresh: Option<f64>,
    log: Option<LogMode>,
    log_period: Option<usize>,
    callback_period: Option<usize>,
    hidden_layers: Option<Vec<usize>>,
}

impl TrainStreamConfigBuilder {
    /// Maximum number of training epochs.
    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Average-error stopping threshold.
    #[must_use]
    pub fn error_thresh(mut self, error_thresh: f64) -> Self {
        self.error_thresh = Some(error_thresh);
        self
    }

    /// Periodic log output mode.
    #[must_use]
    pub fn log(mut self, log: LogMode) -> Self {
        self.log = Some(log);
        self
    }

    /// Epochs between log emissions.
    #[must_use]
    pub fn log_period(mut self, log_period: usize) -> Self {
        self.log_period = Some(log_period);
        self
    }

    /// Epochs between progress-callback invocations.
    #[must_use]
    pub fn callback_period(mut self, callback_period: usize) -> Self {
        self.callback_period = Some(callback_period);
        self
    }

    /// Explicit hidden-layer sizes.
    #[must_use]
    pub fn hidden_layers(mut self, sizes: Vec<usize>) -> Self {
        self.hidden_layers = Some(sizes);
        self
    }

    /// Finish the builder, filling unset fields from the defaults.
    #[must_use]
    pub fn build(self) -> TrainStreamConfig {
        TrainStreamConfig {
            iterations: self.iterations.unwrap_or_else(default_iterations),
            error_thresh: self.error_thresh.unwrap_or_else(default_error_thresh),
            log: self.log.unwrap_or_else(default_log_mode),
            log_period: self.log_period.unwrap_or_else(default_log_period),
            callback_period: self.callback_period.unwrap_or_else(default_callback_period),
            hidden_layers: self.hidden_layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainStreamConfig::default();
        assert_eq!(config.iterations, 20_000);
        assert!((config.error_thresh - 0.005).abs() < f64::EPSILON);
        assert_eq!(config.log, LogMode::Off);
        assert_eq!(config.log_period, 10);
        assert_eq!(config.callback_period, 10);
        assert!(config.hidden_layers.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = TrainStreamConfig::builder()
            .iterations(500)
            .error_thresh(0.01)
            .log(LogMode::Tracing)
            .log_period(5)
            .callback_period(1)
            .hidden_layers(vec![4, 2])
            .build();

        assert_eq!(config.iterations, 500);
        assert!((config.error_thresh - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.log, LogMode::Tracing);
        assert_eq!(config.log_period, 5);
        assert_eq!(config.callback_period, 1);
        assert_eq!(config.hidden_layers, Some(vec![4, 2]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let config = TrainStreamConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let nan = TrainStreamConfig {
            error_thresh: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let negative = TrainStreamConfig {
            error_thresh: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        let config = TrainStreamConfig {
            log_period: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrainStreamConfig {
            callback_period: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_width_hidden_layer() {
        let config = TrainStreamConfig {
            hidden_layers: Some(vec![4, 0]),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // No hidden layers at all is legal.
        let config = TrainStreamConfig {
            hidden_layers: Some(vec![]),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_deserializes_to_defaults() {
        let config: TrainStreamConfig = toml::from_str("").unwrap();
        assert_eq!(config, TrainStreamConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: TrainStreamConfig =
            toml::from_str("iterations = 100\nlog = \"tracing\"").unwrap();
        assert_eq!(config.iterations, 100);
        assert_eq!(config.log, LogMode::Tracing);
        assert_eq!(config.log_period, 10);
        assert!((config.error_thresh - 0.005).abs() < f64::EPSILON);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stream.toml");

        let config = TrainStreamConfig::builder()
            .iterations(250)
            .hidden_layers(vec![6])
            .build();
        config.to_file(&path).unwrap();

        let loaded = TrainStreamConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_from_file_rejects_invalid_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stream.toml");
        std::fs::write(&path, "iterations = 0").unwrap();

        assert!(TrainStreamConfig::from_file(&path).is_err());
    }
}
