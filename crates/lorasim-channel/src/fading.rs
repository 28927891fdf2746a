//! Rayleigh small-scale fading.
//!
//! A fading sample is built from two independent zero-mean Gaussian draws
//! `x, y ~ N(0, sigma^2)`. Their magnitude `r = sqrt(x^2 + y^2)` is Rayleigh
//! distributed, and the loss applied on top of path loss is
//! `-20 * log10(r)`. Magnitudes above one therefore yield a negative loss
//! (a gain).
//!
//! The random source is always passed in by the caller, so a seeded
//! generator reproduces the same sequence of samples.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Loss reported when the fading magnitude collapses to zero.
///
/// Large enough that no configured transmit power can overcome it, while
/// staying finite for downstream arithmetic.
pub const DEEP_FADE_LOSS_DB: f64 = 1000.0;

/// Draw a Rayleigh-distributed fading magnitude with scale `sigma`.
///
/// Consumes exactly two Gaussian draws from `rng`, in a fixed order.
pub fn sample_rayleigh_magnitude<R: Rng + ?Sized>(sigma: f64, rng: &mut R) -> f64 {
    let x: f64 = StandardNormal.sample(rng);
    let y: f64 = StandardNormal.sample(rng);
    (sigma * x).hypot(sigma * y)
}

/// Convert a fading magnitude to a loss in dB.
///
/// Zero, negative or non-finite magnitudes map to [`DEEP_FADE_LOSS_DB`].
pub fn magnitude_to_loss_db(magnitude: f64) -> f64 {
    if magnitude > 0.0 && magnitude.is_finite() {
        -20.0 * magnitude.log10()
    } else {
        DEEP_FADE_LOSS_DB
    }
}

/// Sample a fading loss in dB.
pub fn sample_fading_loss_db<R: Rng + ?Sized>(sigma: f64, rng: &mut R) -> f64 {
    magnitude_to_loss_db(sample_rayleigh_magnitude(sigma, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);

        let a: Vec<u64> = (0..256)
            .map(|_| sample_fading_loss_db(1.0, &mut rng_a).to_bits())
            .collect();
        let b: Vec<u64> = (0..256)
            .map(|_| sample_fading_loss_db(1.0, &mut rng_b).to_bits())
            .collect();

        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_sequence() {
        let mut rng_a = ChaCha8Rng::seed_from_u64(1);
        let mut rng_b = ChaCha8Rng::seed_from_u64(2);

        let a: Vec<f64> = (0..16).map(|_| sample_fading_loss_db(1.0, &mut rng_a)).collect();
        let b: Vec<f64> = (0..16).map(|_| sample_fading_loss_db(1.0, &mut rng_b)).collect();

        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_magnitude_is_deep_fade() {
        assert_eq!(magnitude_to_loss_db(0.0), DEEP_FADE_LOSS_DB);
        assert_eq!(magnitude_to_loss_db(-0.0), DEEP_FADE_LOSS_DB);
        assert_eq!(magnitude_to_loss_db(f64::NAN), DEEP_FADE_LOSS_DB);
    }

    #[test]
    fn test_magnitude_scales_with_sigma() {
        let unit = sample_rayleigh_magnitude(1.0, &mut ChaCha8Rng::seed_from_u64(5));
        let scaled = sample_rayleigh_magnitude(4.0, &mut ChaCha8Rng::seed_from_u64(5));
        assert!(unit > 0.0);
        assert!((scaled - 4.0 * unit).abs() < 1e-12);
        assert!((magnitude_to_loss_db(scaled) - (magnitude_to_loss_db(unit) - 20.0 * 4.0f64.log10())).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sigma_is_deep_fade() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(sample_fading_loss_db(0.0, &mut rng), DEEP_FADE_LOSS_DB);
    }

    #[test]
    fn test_sign_convention() {
        // r > 1 is a gain, r < 1 a loss, r == 1 neutral
        assert!(magnitude_to_loss_db(2.0) < 0.0);
        assert!((magnitude_to_loss_db(10.0) + 20.0).abs() < 1e-12);
        assert!((magnitude_to_loss_db(0.1) - 20.0).abs() < 1e-12);
        assert_eq!(magnitude_to_loss_db(1.0), 0.0);
    }

    #[test]
    fn test_rayleigh_second_moment() {
        // E[r^2] = 2 * sigma^2 for a Rayleigh distribution with scale sigma
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let sigma = 1.5;
        let n = 20_000;
        let mean_sq: f64 = (0..n)
            .map(|_| sample_rayleigh_magnitude(sigma, &mut rng).powi(2))
            .sum::<f64>()
            / n as f64;
        let expected = 2.0 * sigma * sigma;
        assert!(
            (mean_sq - expected).abs() / expected < 0.05,
            "E[r^2] = {} expected {}",
            mean_sq,
            expected
        );
    }

    #[test]
    fn test_samples_are_finite() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..10_000 {
            assert!(sample_fading_loss_db(1.0, &mut rng).is_finite());
        }
    }
}
