//! Channel configuration.

use crate::error::ConfigError;
use crate::thermal::{compute_noise_floor_dbm, ZERO_CELSIUS_K};

// ============================================================================
// Noise Source Selection
// ============================================================================

/// Where the noise reference for the SNR decision comes from.
///
/// The two sources are mutually exclusive and each carries its own
/// acceptance threshold in [`ChannelParameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NoiseSource {
    /// A fixed, configured additive white Gaussian noise floor.
    FixedAwgn,
    /// Physical thermal noise from temperature, bandwidth and noise figure.
    #[default]
    Thermal,
}

impl NoiseSource {
    /// Returns the source as a lowercase label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NoiseSource::FixedAwgn => "fixed_awgn",
            NoiseSource::Thermal => "thermal",
        }
    }
}

impl std::fmt::Display for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NoiseSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed_awgn" | "awgn" => Ok(NoiseSource::FixedAwgn),
            "thermal" => Ok(NoiseSource::Thermal),
            other => Err(format!("Unknown noise source '{}' (expected thermal or fixed_awgn)", other)),
        }
    }
}

// ============================================================================
// Evaluation Options
// ============================================================================

/// Per-run switches that select which impairments apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvaluationOptions {
    /// Noise reference used for the SNR decision.
    pub noise_source: NoiseSource,
    /// Whether a Rayleigh fading sample is added to the path loss.
    #[cfg_attr(feature = "serde", serde(rename = "fading"))]
    pub enable_fading: bool,
}

impl EvaluationOptions {
    /// Create options with the given noise source and fading flag.
    pub fn new(noise_source: NoiseSource, enable_fading: bool) -> Self {
        Self {
            noise_source,
            enable_fading,
        }
    }
}

// ============================================================================
// Channel Parameters
// ============================================================================

/// Numeric configuration of the channel model.
///
/// Immutable for the duration of a run. Every field has a default; call
/// [`ChannelParameters::validate`] before evaluating with values that came
/// from outside the program.
///
/// # Example
///
/// ```
/// use lorasim_channel::{ChannelParameters, NoiseSource};
///
/// let params = ChannelParameters {
///     path_loss_exponent: 3.76,
///     ..Default::default()
/// };
/// params.validate().unwrap();
/// assert_eq!(params.snr_threshold_db(NoiseSource::Thermal), 3.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ChannelParameters {
    // Path loss
    /// Loss at the 1 m reference distance (dB).
    pub reference_loss_db: f64,
    /// Path-loss exponent, typically 2.0 (free space) to 4.0 (dense urban).
    pub path_loss_exponent: f64,

    // Fading
    /// Standard deviation of each Gaussian component of the Rayleigh sample.
    pub fading_sigma: f64,

    // Thermal noise
    /// Receiver temperature (°C).
    pub temperature_c: f64,
    /// Receiver bandwidth (Hz).
    pub bandwidth_hz: f64,
    /// Receiver noise figure (dB).
    pub noise_figure_db: f64,
    /// Acceptance threshold when the thermal source is selected (dB).
    pub thermal_snr_threshold_db: f64,

    // Fixed AWGN
    /// Noise floor when the fixed AWGN source is selected (dBm).
    pub awgn_noise_floor_dbm: f64,
    /// Acceptance threshold when the fixed AWGN source is selected (dB).
    pub awgn_snr_threshold_db: f64,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            reference_loss_db: 46.6777,
            path_loss_exponent: 3.0,

            fading_sigma: 1.0,

            temperature_c: 25.0,
            bandwidth_hz: 125_000.0,
            noise_figure_db: 3.0,
            thermal_snr_threshold_db: 3.0,

            awgn_noise_floor_dbm: -100.0,
            awgn_snr_threshold_db: 0.0,
        }
    }
}

impl ChannelParameters {
    /// Reject configurations the model cannot evaluate.
    ///
    /// Checks, in order: every field is finite, exponent > 0, bandwidth > 0,
    /// temperature above absolute zero, fading sigma > 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("reference_loss_db", self.reference_loss_db),
            ("path_loss_exponent", self.path_loss_exponent),
            ("fading_sigma", self.fading_sigma),
            ("temperature_c", self.temperature_c),
            ("bandwidth_hz", self.bandwidth_hz),
            ("noise_figure_db", self.noise_figure_db),
            ("thermal_snr_threshold_db", self.thermal_snr_threshold_db),
            ("awgn_noise_floor_dbm", self.awgn_noise_floor_dbm),
            ("awgn_snr_threshold_db", self.awgn_snr_threshold_db),
        ];
        if let Some(&(field, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NonFinite { field, value });
        }

        if self.path_loss_exponent <= 0.0 {
            return Err(ConfigError::NonPositiveExponent(self.path_loss_exponent));
        }
        if self.bandwidth_hz <= 0.0 {
            return Err(ConfigError::NonPositiveBandwidth(self.bandwidth_hz));
        }
        if self.temperature_c <= -ZERO_CELSIUS_K {
            return Err(ConfigError::TemperatureBelowAbsoluteZero(self.temperature_c));
        }
        if self.fading_sigma <= 0.0 {
            return Err(ConfigError::NonPositiveFadingSigma(self.fading_sigma));
        }
        Ok(())
    }

    /// Noise floor (dBm) for the selected source.
    pub fn noise_floor_dbm(&self, source: NoiseSource) -> f64 {
        match source {
            NoiseSource::FixedAwgn => self.awgn_noise_floor_dbm,
            NoiseSource::Thermal => {
                compute_noise_floor_dbm(self.temperature_c, self.bandwidth_hz, self.noise_figure_db)
            }
        }
    }

    /// Acceptance threshold (dB) for the selected source.
    pub fn snr_threshold_db(&self, source: NoiseSource) -> f64 {
        match source {
            NoiseSource::FixedAwgn => self.awgn_snr_threshold_db,
            NoiseSource::Thermal => self.thermal_snr_threshold_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = ChannelParameters::default();
        assert_eq!(params.validate(), Ok(()));
        assert_eq!(params.reference_loss_db, 46.6777);
        assert_eq!(params.path_loss_exponent, 3.0);
        assert_eq!(params.awgn_snr_threshold_db, 0.0);
        assert_eq!(params.thermal_snr_threshold_db, 3.0);
    }

    #[test]
    fn test_rejects_non_positive_exponent() {
        for exponent in [0.0, -2.0] {
            let params = ChannelParameters {
                path_loss_exponent: exponent,
                ..Default::default()
            };
            assert_eq!(params.validate(), Err(ConfigError::NonPositiveExponent(exponent)));
        }
    }

    #[test]
    fn test_rejects_non_positive_bandwidth() {
        let params = ChannelParameters {
            bandwidth_hz: 0.0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::NonPositiveBandwidth(0.0)));
    }

    #[test]
    fn test_rejects_absolute_zero() {
        let params = ChannelParameters {
            temperature_c: -273.15,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ConfigError::TemperatureBelowAbsoluteZero(-273.15))
        );

        let params = ChannelParameters {
            temperature_c: -273.0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_non_positive_sigma() {
        let params = ChannelParameters {
            fading_sigma: 0.0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::NonPositiveFadingSigma(0.0)));
    }

    #[test]
    fn test_rejects_non_finite() {
        let params = ChannelParameters {
            noise_figure_db: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NonFinite { field: "noise_figure_db", .. })
        ));
    }

    #[test]
    fn test_thresholds_configured_independently() {
        let params = ChannelParameters {
            awgn_snr_threshold_db: -1.5,
            thermal_snr_threshold_db: 6.0,
            ..Default::default()
        };
        assert_eq!(params.snr_threshold_db(NoiseSource::FixedAwgn), -1.5);
        assert_eq!(params.snr_threshold_db(NoiseSource::Thermal), 6.0);
    }

    #[test]
    fn test_noise_floor_by_source() {
        let params = ChannelParameters::default();
        assert_eq!(params.noise_floor_dbm(NoiseSource::FixedAwgn), -100.0);
        let thermal = params.noise_floor_dbm(NoiseSource::Thermal);
        assert!((thermal - (-119.888)).abs() < 1e-3);
    }

    #[test]
    fn test_noise_source_from_str() {
        assert_eq!("thermal".parse::<NoiseSource>(), Ok(NoiseSource::Thermal));
        assert_eq!("AWGN".parse::<NoiseSource>(), Ok(NoiseSource::FixedAwgn));
        assert_eq!("fixed_awgn".parse::<NoiseSource>(), Ok(NoiseSource::FixedAwgn));
        assert!("pink".parse::<NoiseSource>().is_err());
    }
}
