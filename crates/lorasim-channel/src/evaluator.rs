//! Per-transmission channel evaluation.
//!
//! Composes path loss, optional Rayleigh fading, the selected noise floor and
//! the SNR decision into a single [`ChannelOutcome`]. Evaluation is a total
//! function: a failed link is reported as `success == false`, never as an
//! error. The only state that changes across calls is the caller's random
//! source, and only when fading is enabled.

use crate::decision::evaluate_snr;
use crate::error::ConfigError;
use crate::fading::sample_fading_loss_db;
use crate::params::{ChannelParameters, EvaluationOptions, NoiseSource};
use crate::path_loss::compute_loss_db;
use lorasim_common::{Position, Transmission};
use rand::Rng;
use tracing::{debug, warn};

/// Received power reported for a transmission that was not decoded (dBm).
pub const LOST_POWER_DBM: f64 = -1000.0;

/// Result of evaluating one transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelOutcome {
    /// Received power in dBm, or [`LOST_POWER_DBM`] when not decoded.
    pub received_power_dbm: f64,
    /// Computed SNR in dB. Reported for lost transmissions too.
    pub snr_db: f64,
    /// Whether the gateway decoded the transmission.
    pub success: bool,
    /// Sender to receiver distance (m).
    pub distance_m: f64,
    /// Deterministic path loss (dB).
    pub path_loss_db: f64,
    /// Fading loss (dB) when fading was applied.
    pub fading_loss_db: Option<f64>,
    /// Noise floor the SNR was measured against (dBm).
    pub noise_floor_dbm: f64,
}

impl ChannelOutcome {
    /// Whether the transmission was lost.
    pub fn is_lost(&self) -> bool {
        !self.success
    }

    /// Total attenuation applied to the signal (dB).
    pub fn total_loss_db(&self) -> f64 {
        self.path_loss_db + self.fading_loss_db.unwrap_or(0.0)
    }
}

/// Evaluate a link at a known distance against a known noise reference.
fn evaluate_at_distance<R: Rng + ?Sized>(
    tx_power_dbm: f64,
    distance_m: f64,
    noise_floor_dbm: f64,
    threshold_db: f64,
    params: &ChannelParameters,
    options: &EvaluationOptions,
    rng: &mut R,
) -> ChannelOutcome {
    let path_loss_db = compute_loss_db(distance_m, params.reference_loss_db, params.path_loss_exponent);
    let fading_loss_db = options
        .enable_fading
        .then(|| sample_fading_loss_db(params.fading_sigma, rng));
    let total_loss_db = path_loss_db + fading_loss_db.unwrap_or(0.0);

    let signal_power_dbm = tx_power_dbm - total_loss_db;
    let decision = evaluate_snr(signal_power_dbm, noise_floor_dbm, threshold_db);

    ChannelOutcome {
        received_power_dbm: if decision.success {
            signal_power_dbm
        } else {
            LOST_POWER_DBM
        },
        snr_db: decision.snr_db,
        success: decision.success,
        distance_m,
        path_loss_db,
        fading_loss_db,
        noise_floor_dbm,
    }
}

/// Evaluate a transmission from `sender` to `receiver`.
///
/// Assumes `params` has passed [`ChannelParameters::validate`]. Prefer
/// [`ChannelEvaluator`] when evaluating many transmissions under one
/// configuration.
pub fn evaluate_transmission<R: Rng + ?Sized>(
    transmission: &Transmission,
    sender: Position,
    receiver: Position,
    params: &ChannelParameters,
    options: &EvaluationOptions,
    rng: &mut R,
) -> ChannelOutcome {
    let source = options.noise_source;
    evaluate_at_distance(
        transmission.tx_power_dbm,
        sender.distance_to(&receiver),
        params.noise_floor_dbm(source),
        params.snr_threshold_db(source),
        params,
        options,
        rng,
    )
}

/// A validated channel configuration ready to evaluate transmissions.
///
/// The noise floor is resolved once at construction. The evaluator holds no
/// mutable state and can be shared across threads; callers supply the random
/// source on every call.
///
/// # Example
///
/// ```
/// use lorasim_channel::{ChannelEvaluator, ChannelParameters, EvaluationOptions, NoiseSource};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let evaluator = ChannelEvaluator::new(
///     ChannelParameters::default(),
///     EvaluationOptions::new(NoiseSource::FixedAwgn, false),
/// )
/// .unwrap();
///
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let outcome = evaluator.evaluate_link(14.0, 100.0, &mut rng);
/// assert!(outcome.success);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelEvaluator {
    params: ChannelParameters,
    options: EvaluationOptions,
    noise_floor_dbm: f64,
    snr_threshold_db: f64,
}

impl ChannelEvaluator {
    /// Validate the configuration and build an evaluator.
    pub fn new(params: ChannelParameters, options: EvaluationOptions) -> Result<Self, ConfigError> {
        params.validate()?;

        if !(2.0..=4.0).contains(&params.path_loss_exponent) {
            warn!(
                exponent = params.path_loss_exponent,
                "Path-loss exponent outside the usual 2.0-4.0 range"
            );
        }
        if options.enable_fading && params.fading_sigma > 10.0 {
            warn!(sigma = params.fading_sigma, "Unusually large fading sigma");
        }

        let noise_floor_dbm = params.noise_floor_dbm(options.noise_source);
        let snr_threshold_db = params.snr_threshold_db(options.noise_source);
        debug!(
            noise_source = %options.noise_source,
            noise_floor_dbm,
            snr_threshold_db,
            fading = options.enable_fading,
            "Channel evaluator configured"
        );

        Ok(Self {
            params,
            options,
            noise_floor_dbm,
            snr_threshold_db,
        })
    }

    /// The channel parameters.
    pub fn params(&self) -> &ChannelParameters {
        &self.params
    }

    /// The evaluation options.
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Selected noise source.
    pub fn noise_source(&self) -> NoiseSource {
        self.options.noise_source
    }

    /// Noise floor used for every evaluation (dBm).
    pub fn noise_floor_dbm(&self) -> f64 {
        self.noise_floor_dbm
    }

    /// Acceptance threshold used for every evaluation (dB).
    pub fn snr_threshold_db(&self) -> f64 {
        self.snr_threshold_db
    }

    /// Evaluate a transmission between two positions.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        transmission: &Transmission,
        sender: Position,
        receiver: Position,
        rng: &mut R,
    ) -> ChannelOutcome {
        let outcome = self.evaluate_link(transmission.tx_power_dbm, sender.distance_to(&receiver), rng);
        debug!(
            seq = transmission.sequence,
            sender = %transmission.sender,
            receiver = %transmission.receiver,
            distance_m = outcome.distance_m,
            path_loss_db = outcome.path_loss_db,
            fading_loss_db = ?outcome.fading_loss_db,
            snr_db = outcome.snr_db,
            success = outcome.success,
            "Channel evaluated"
        );
        outcome
    }

    /// Evaluate a link given only transmit power and distance.
    pub fn evaluate_link<R: Rng + ?Sized>(&self, tx_power_dbm: f64, distance_m: f64, rng: &mut R) -> ChannelOutcome {
        evaluate_at_distance(
            tx_power_dbm,
            distance_m,
            self.noise_floor_dbm,
            self.snr_threshold_db,
            &self.params,
            &self.options,
            rng,
        )
    }
}
