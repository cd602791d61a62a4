//! Error types for the training stream.

use thiserror::Error;

/// Result type for training-stream operations.
pub type Result<T> = std::result::Result<T, TrainStreamError>;

/// Errors that can occur while driving a training stream.
#[derive(Debug, Error)]
pub enum TrainStreamError {
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The first epoch delivered no records, so no shape can be inferred
    #[error("first epoch delivered no records; cannot infer a shape")]
    EmptyFirstEpoch,

    /// The stream already returned its final stats
    #[error("training stream is finished; no further records are accepted")]
    StreamFinished,

    /// A datum's layout contradicts the shape determined from the first epoch
    #[error("{side} layout mismatch: shape was determined as {expected}, datum carries {got}")]
    LayoutMismatch {
        /// Which side of the datum conflicted (`"input"` or `"output"`)
        side: &'static str,
        /// Layout recorded in the shape descriptor
        expected: &'static str,
        /// Layout the offending datum carries
        got: &'static str,
    },

    /// Failure propagated from the model's formatting or training step
    #[error("training error: {0}")]
    Training(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl TrainStreamError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a training error
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }
}
