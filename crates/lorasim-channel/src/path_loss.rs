//! Log-distance path loss.

/// Distance at which the reference loss is defined (m).
pub const REFERENCE_DISTANCE_M: f64 = 1.0;

/// Deterministic large-scale attenuation in dB.
///
/// `loss = reference_loss_db + 10 * exponent * log10(distance_m)`.
///
/// Distances at or inside the reference distance (including zero, where the
/// logarithm is undefined) return `reference_loss_db` unchanged, which keeps
/// the loss non-decreasing over the whole range `distance_m >= 0`.
pub fn compute_loss_db(distance_m: f64, reference_loss_db: f64, exponent: f64) -> f64 {
    if !(distance_m > REFERENCE_DISTANCE_M) {
        return reference_loss_db;
    }
    reference_loss_db + 10.0 * exponent * distance_m.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF_LOSS: f64 = 46.6777;

    #[test]
    fn test_zero_distance_is_reference_loss() {
        assert_eq!(compute_loss_db(0.0, REF_LOSS, 3.0), REF_LOSS);
        assert_eq!(compute_loss_db(0.0, 40.0, 2.0), 40.0);
    }

    #[test]
    fn test_hundred_meters() {
        let loss = compute_loss_db(100.0, REF_LOSS, 3.0);
        assert!((loss - 106.6777).abs() < 1e-9, "loss = {}", loss);
    }

    #[test]
    fn test_exponent_scales_slope() {
        let free_space = compute_loss_db(1000.0, 0.0, 2.0);
        let urban = compute_loss_db(1000.0, 0.0, 3.5);
        assert!((free_space - 60.0).abs() < 1e-9);
        assert!((urban - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_distance() {
        let distances = [
            0.0, 0.25, 0.5, 0.999, 1.0, 1.001, 2.0, 10.0, 99.9, 100.0, 1500.0, 2000.0, 1e6,
        ];
        for exponent in [2.0, 2.7, 3.0, 3.76, 4.0] {
            for pair in distances.windows(2) {
                let near = compute_loss_db(pair[0], REF_LOSS, exponent);
                let far = compute_loss_db(pair[1], REF_LOSS, exponent);
                assert!(
                    far >= near,
                    "loss({}) = {} < loss({}) = {} for n = {}",
                    pair[1], far, pair[0], near, exponent
                );
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let a = compute_loss_db(1234.5, REF_LOSS, 3.76);
        let b = compute_loss_db(1234.5, REF_LOSS, 3.76);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
