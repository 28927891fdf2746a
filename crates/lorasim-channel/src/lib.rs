//! # lorasim-channel
//!
//! Channel impairment model for a LoRa uplink from an end device to a gateway.
//!
//! Each transmission is attenuated by log-distance path loss, optionally by a
//! Rayleigh fading sample, and then compared against a noise floor. The noise
//! floor comes either from a fixed AWGN level or from thermal noise, each with
//! its own SNR acceptance threshold.
//!
//! ## Features
//!
//! - **Path loss**: [`compute_loss_db`]
//! - **Fading**: [`sample_fading_loss_db`], seeded through a caller-supplied RNG
//! - **Thermal noise**: [`compute_noise_floor_dbm`]
//! - **SNR decision**: [`evaluate_snr`]
//! - **Evaluation**: [`ChannelEvaluator`] and [`evaluate_transmission`]
//!
//! With the `serde` feature, configuration and outcome types implement
//! `Serialize`/`Deserialize`.

mod decision;
mod error;
mod evaluator;
mod fading;
mod params;
mod path_loss;
mod thermal;

pub use decision::{db_to_linear, evaluate_snr, linear_to_db, snr_db, SnrDecision};
pub use error::ConfigError;
pub use evaluator::{evaluate_transmission, ChannelEvaluator, ChannelOutcome, LOST_POWER_DBM};
pub use fading::{
    magnitude_to_loss_db, sample_fading_loss_db, sample_rayleigh_magnitude, DEEP_FADE_LOSS_DB,
};
pub use params::{ChannelParameters, EvaluationOptions, NoiseSource};
pub use path_loss::{compute_loss_db, REFERENCE_DISTANCE_M};
pub use thermal::{compute_noise_floor_dbm, BOLTZMANN_J_PER_K, ZERO_CELSIUS_K};
