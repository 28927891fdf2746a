//! SNR computation and acceptance decision.

/// Outcome of comparing a received signal against a noise floor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnrDecision {
    /// Signal-to-noise ratio in dB.
    pub snr_db: f64,
    /// Whether the SNR strictly exceeds the threshold.
    pub success: bool,
}

/// Convert a power level in dBm (or dB) to linear scale.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a linear power ratio to dB.
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

/// SNR in dB between a received power and a noise floor, both in dBm.
///
/// The ratio is taken in linear power. When either side under- or overflows
/// `f64` the equivalent log-domain difference is returned instead.
pub fn snr_db(received_power_dbm: f64, noise_floor_dbm: f64) -> f64 {
    let signal_linear = db_to_linear(received_power_dbm);
    let noise_linear = db_to_linear(noise_floor_dbm);
    let snr = linear_to_db(signal_linear / noise_linear);
    if snr.is_finite() {
        snr
    } else {
        received_power_dbm - noise_floor_dbm
    }
}

/// Decide whether a reception succeeds.
///
/// `success` is `snr_db > threshold_db`; an SNR exactly at the threshold is
/// a failure.
pub fn evaluate_snr(received_power_dbm: f64, noise_floor_dbm: f64, threshold_db: f64) -> SnrDecision {
    let snr_db = snr_db(received_power_dbm, noise_floor_dbm);
    SnrDecision {
        snr_db,
        success: snr_db > threshold_db,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_awgn_baseline_threshold() {
        let d = evaluate_snr(-92.6777, -95.0, 0.0);
        assert!((d.snr_db - 2.3223).abs() < 1e-9, "snr = {}", d.snr_db);
        assert!(d.success);
    }

    #[test]
    fn test_thermal_threshold_rejects_same_link() {
        let d = evaluate_snr(-92.6777, -95.0, 3.0);
        assert!(!d.success);
    }

    #[test]
    fn test_equal_to_threshold_fails() {
        let d = evaluate_snr(-100.0, -100.0, 0.0);
        assert_eq!(d.snr_db, 0.0);
        assert!(!d.success);
    }

    #[test]
    fn test_matches_linear_formula() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..5_000 {
            let p: f64 = rng.gen_range(-200.0..40.0);
            let n: f64 = rng.gen_range(-180.0..-60.0);
            let t: f64 = rng.gen_range(-25.0..25.0);

            let expected = 10.0 * (10f64.powf(p / 10.0) / 10f64.powf(n / 10.0)).log10() > t;
            assert_eq!(evaluate_snr(p, n, t).success, expected, "p={} n={} t={}", p, n, t);
        }
    }

    #[test]
    fn test_extreme_powers_stay_finite() {
        let d = evaluate_snr(-5000.0, -120.0, 0.0);
        assert!(d.snr_db.is_finite());
        assert!(!d.success);
    }

    #[test]
    fn test_db_round_trip() {
        assert!((linear_to_db(db_to_linear(-37.5)) + 37.5).abs() < 1e-9);
        assert_eq!(db_to_linear(0.0), 1.0);
    }
}
