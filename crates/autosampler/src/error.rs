//! Error types for the sampling, training and synthesis pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building datasets, training or synthesizing
#[derive(Debug, Error)]
pub enum SamplerError {
    /// An audio file could not be decoded into a usable waveform
    #[error("cannot decode '{}': {reason}", path.display())]
    Decode {
        /// Path of the offending file
        path: PathBuf,
        /// Decoder-level description of the failure
        reason: String,
    },

    /// The assembled dataset contains no items
    #[error("dataset contains no items")]
    EmptyDataset,

    /// A model snapshot could not be read or written
    #[error("model snapshot error: {reason}")]
    Snapshot {
        /// Description of the failure
        reason: String,
    },

    /// A loaded parameter tensor does not match the configured dimensions
    #[error("shape mismatch in '{name}': expected {expected}, found {found}")]
    ShapeMismatch {
        /// Name of the parameter tensor
        name: String,
        /// Expected shape
        expected: String,
        /// Shape found in the snapshot
        found: String,
    },

    /// A configuration value is out of range
    #[error("invalid config '{name}': {message}")]
    InvalidConfig {
        /// Configuration field name
        name: String,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SamplerError {
    /// Create a decode error
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a snapshot error
    pub fn snapshot(reason: impl Into<String>) -> Self {
        Self::Snapshot {
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(
        name: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type for sampler operations
pub type SamplerResult<T> = Result<T, SamplerError>;
