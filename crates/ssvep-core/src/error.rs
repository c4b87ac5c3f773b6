//! Error handling for the SSVEP workspace
//!
//! One error type covers input validation, filter design, configuration and
//! the EEG source boundary. Low-confidence classifications are not errors;
//! they are reported as [`crate::Decision::NoDecision`].

use thiserror::Error;

/// Result type alias for SSVEP operations
pub type SsvepResult<T> = Result<T, SsvepError>;

/// Error type for all SSVEP operations
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SsvepError {
    /// Sub-band index outside the filter-bank table
    #[error("Invalid sub-band index {index}: must be 0 <= index <= {max}")]
    InvalidSubband {
        /// Requested index
        index: usize,
        /// Largest valid index
        max: usize,
    },

    /// EEG window has the wrong rank or inconsistent dimensions
    #[error("Invalid EEG window shape: {reason}")]
    InvalidWindowShape {
        /// Description of the shape problem
        reason: String,
    },

    /// Channel count differs from what the caller expects
    #[error("Channel mismatch: expected {expected} channels, got {actual}")]
    ChannelMismatch {
        /// Expected channel count
        expected: usize,
        /// Channel count found
        actual: usize,
    },

    /// Not enough samples to fill the requested window
    #[error("Insufficient samples: {available} available, {required} required")]
    InsufficientSamples {
        /// Samples currently available
        available: usize,
        /// Samples needed
        required: usize,
    },

    /// Sampling rate unusable for the requested operation
    #[error("Invalid sampling rate {rate}Hz: {reason}")]
    InvalidSamplingRate {
        /// Provided sampling rate
        rate: f64,
        /// Why the rate was rejected
        reason: String,
    },

    /// Invalid classifier or session configuration
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration error
        message: String,
    },

    /// Filter design failed for the given band edges
    #[error("Filter design failed: {reason}")]
    FilterDesign {
        /// Description of the design failure
        reason: String,
    },

    /// The EEG source could not deliver a window
    #[error("EEG source error: {reason}")]
    SourceError {
        /// Source-related error description
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Serialization error description
        message: String,
    },
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::SsvepError::ConfigurationError {
            message: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating window shape errors
#[macro_export]
macro_rules! shape_error {
    ($($arg:tt)+) => {
        $crate::error::SsvepError::InvalidWindowShape {
            reason: format!($($arg)+),
        }
    };
}
