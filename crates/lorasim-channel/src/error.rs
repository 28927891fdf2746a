//! Error types for the channel crate.

use thiserror::Error;

/// Invalid channel configuration.
///
/// Raised before any evaluation takes place. Values are never clamped into
/// range; the whole configuration is rejected instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Path-loss exponent must be strictly positive.
    #[error("Path-loss exponent must be > 0, got {0}")]
    NonPositiveExponent(f64),

    /// Bandwidth must be strictly positive.
    #[error("Bandwidth must be > 0 Hz, got {0}")]
    NonPositiveBandwidth(f64),

    /// Temperature at or below absolute zero.
    #[error("Temperature must be above -273.15 °C, got {0}")]
    TemperatureBelowAbsoluteZero(f64),

    /// Fading standard deviation must be strictly positive.
    #[error("Fading sigma must be > 0, got {0}")]
    NonPositiveFadingSigma(f64),

    /// Link distance is negative or not a number.
    #[error("Link distance must be a finite value >= 0 m, got {0}")]
    InvalidDistance(f64),

    /// A numeric field is NaN or infinite.
    #[error("Channel parameter '{field}' must be finite, got {value}")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}
