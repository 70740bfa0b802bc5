//! Error types for specdegrade

use thiserror::Error;

/// Main error type for specdegrade
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No sample ever crossed the lowest detection threshold; the signal is
    /// silence or below the assumed quantization resolution.
    #[error("Could not detect any activity")]
    ActivityNotDetected,

    /// Even the most active frames failed to clear the required margin over
    /// the lowest threshold.
    #[error("No frame above margin M={margin_db:.1}dB detected")]
    MarginNotMet { margin_db: f64 },

    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Result type for specdegrade operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}
