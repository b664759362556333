//! Error handling for the EEG analysis workspace
//!
//! A single error type is shared by every crate so that a failing stage can
//! be reported with its structured context, whatever crate raised it.

use std::fmt;

/// Result type alias for EEG analysis operations
pub type EegResult<T> = Result<T, EegError>;

/// Error type for all loading, processing and decoding operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EegError {
    /// Recording data inconsistent with its channel description
    InvalidSignalData {
        /// Description of the inconsistency
        reason: String,
    },

    /// Sampling rate outside the supported range
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f64,
        /// Valid range description
        valid_range: String,
    },

    /// Channel name not present in the recording
    UnknownChannel {
        /// Requested channel name
        name: String,
    },

    /// Filter cutoffs violate 0 < low < high < Nyquist
    InvalidFilterBand {
        /// Low cutoff in Hz (0 for a pure lowpass)
        low_hz: f64,
        /// High cutoff in Hz (Nyquist for a pure highpass)
        high_hz: f64,
        /// Nyquist frequency of the recording
        nyquist_hz: f64,
    },

    /// Epoch window with tmin >= tmax or outside any representable range
    InvalidEpochWindow {
        tmin: f64,
        tmax: f64,
    },

    /// No epochs left to work with
    EmptyEpochs {
        /// What produced the empty collection
        reason: String,
    },

    /// Dataset dimensions differ from what a model expects
    ShapeMismatch {
        /// Expected (channels, times)
        expected: (usize, usize),
        /// Actual (channels, times)
        actual: (usize, usize),
    },

    /// Flattened samples have a different feature count than expected
    FeatureMismatch {
        /// Features per sample the model or dataset was built for
        expected: usize,
        /// Features per sample in the input
        actual: usize,
    },

    /// A required configuration value was not supplied
    MissingParameter {
        /// Dotted path of the parameter, e.g. `topomap.fmin`
        name: String,
    },

    /// Configuration present but invalid
    ConfigurationError {
        message: String,
    },

    /// Signal processing stage failed
    ProcessingError {
        message: String,
    },

    /// Model fitting failed
    TrainingError {
        message: String,
    },

    /// File could not be read or written
    Io {
        /// Path involved in the operation
        path: String,
        /// Underlying error description
        reason: String,
    },

    /// File content could not be parsed
    FormatError {
        reason: String,
    },
}

impl fmt::Display for EegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EegError::InvalidSignalData { reason } => {
                write!(f, "Invalid signal data: {}", reason)
            }
            EegError::InvalidSamplingRate { rate, valid_range } => {
                write!(f, "Invalid sampling rate: {}Hz, valid range: {}", rate, valid_range)
            }
            EegError::UnknownChannel { name } => {
                write!(f, "Unknown channel '{}'", name)
            }
            EegError::InvalidFilterBand { low_hz, high_hz, nyquist_hz } => {
                write!(f, "Invalid filter band [{} Hz, {} Hz]: cutoffs must satisfy 0 < low < high < {} Hz (Nyquist)",
                       low_hz, high_hz, nyquist_hz)
            }
            EegError::InvalidEpochWindow { tmin, tmax } => {
                write!(f, "Invalid epoch window [{:.3}, {:.3}]s: tmin must be less than tmax", tmin, tmax)
            }
            EegError::EmptyEpochs { reason } => {
                write!(f, "No epochs available: {}", reason)
            }
            EegError::ShapeMismatch { expected, actual } => {
                write!(f, "Shape mismatch: model expects {} channels x {} samples, got {} x {}",
                       expected.0, expected.1, actual.0, actual.1)
            }
            EegError::FeatureMismatch { expected, actual } => {
                write!(f, "Feature mismatch: expected {} features per sample, got {}", expected, actual)
            }
            EegError::MissingParameter { name } => {
                write!(f, "Missing required parameter '{}'", name)
            }
            EegError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            EegError::ProcessingError { message } => {
                write!(f, "Processing error: {}", message)
            }
            EegError::TrainingError { message } => {
                write!(f, "Training error: {}", message)
            }
            EegError::Io { path, reason } => {
                write!(f, "I/O error on '{}': {}", path, reason)
            }
            EegError::FormatError { reason } => {
                write!(f, "Format error: {}", reason)
            }
        }
    }
}

impl std::error::Error for EegError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::EegError::ConfigurationError {
            message: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating format errors
#[macro_export]
macro_rules! format_error {
    ($($arg:tt)+) => {
        $crate::error::EegError::FormatError {
            reason: format!($($arg)+),
        }
    };
}
