//! Seeded device placement.

use crate::{DeviceConfig, UniformDiscConfig};
use lorasim_common::Position;
use rand::Rng;
use std::f64::consts::PI;

/// Draw a point uniformly distributed over a disc.
///
/// Uses `radius * sqrt(u)` for the distance from the centre so that area
/// density is uniform, and `2 * pi * v` for the angle.
pub fn sample_disc_position<R: Rng + ?Sized>(
    center: [f64; 2],
    radius_m: f64,
    height_m: f64,
    rng: &mut R,
) -> Position {
    let u: f64 = rng.gen();
    let v: f64 = rng.gen();
    let rho = radius_m * u.sqrt();
    let theta = 2.0 * PI * v;
    Position::new(center[0] + rho * theta.cos(), center[1] + rho * theta.sin(), height_m)
}

/// Generate `disc.count` devices placed uniformly over the configured disc.
///
/// Device `i` is named `{name_prefix}{i}`. When radio profiles are listed
/// they are assigned round-robin; otherwise every device gets the disc's
/// default transmit power and data rate. Gateways are left unassigned so the
/// topology picks the nearest one.
pub fn place_uniform_disc<R: Rng + ?Sized>(disc: &UniformDiscConfig, rng: &mut R) -> Vec<DeviceConfig> {
    (0..disc.count)
        .map(|i| {
            let position = sample_disc_position(disc.center, disc.radius_m, disc.height_m, rng);
            let (tx_power_dbm, data_rate) = match disc.profiles.get(i % disc.profiles.len().max(1)) {
                Some(profile) => (profile.tx_power_dbm, profile.data_rate),
                None => (disc.tx_power_dbm, disc.data_rate),
            };
            DeviceConfig {
                name: format!("{}{}", disc.name_prefix, i),
                position,
                tx_power_dbm,
                data_rate,
                gateway: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RadioProfile;
    use lorasim_common::DataRate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_samples_stay_inside_disc() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let center = Position::new(100.0, -50.0, 0.0);
        for _ in 0..5000 {
            let p = sample_disc_position([100.0, -50.0], 2000.0, 1.5, &mut rng);
            let planar = Position::new(p.x, p.y, 0.0).distance_to(&center);
            assert!(planar <= 2000.0);
            assert_eq!(p.z, 1.5);
        }
    }

    #[test]
    fn test_area_uniformity() {
        // Half the area of a disc lies within radius / sqrt(2).
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let n = 20_000;
        let inner = (0..n)
            .map(|_| sample_disc_position([0.0, 0.0], 1000.0, 0.0, &mut rng))
            .filter(|p| p.distance_to(&Position::ORIGIN) < 1000.0 / 2f64.sqrt())
            .count();
        let fraction = inner as f64 / n as f64;
        assert!((fraction - 0.5).abs() < 0.02, "fraction = {fraction}");
    }

    #[test]
    fn test_zero_radius_places_on_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = sample_disc_position([3.0, 4.0], 0.0, 2.0, &mut rng);
        assert_eq!(p, Position::new(3.0, 4.0, 2.0));
    }

    #[test]
    fn test_profiles_assigned_round_robin() {
        let disc = UniformDiscConfig {
            count: 4,
            profiles: vec![
                RadioProfile {
                    tx_power_dbm: 14.0,
                    data_rate: DataRate::DR5,
                },
                RadioProfile {
                    tx_power_dbm: 6.0,
                    data_rate: DataRate::DR1,
                },
            ],
            ..Default::default()
        };
        let devices = place_uniform_disc(&disc, &mut ChaCha8Rng::seed_from_u64(0));

        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["ed0", "ed1", "ed2", "ed3"]);
        assert_eq!(devices[0].tx_power_dbm, 14.0);
        assert_eq!(devices[1].data_rate, DataRate::DR1);
        assert_eq!(devices[2].data_rate, DataRate::DR5);
        assert!(devices.iter().all(|d| d.gateway.is_none()));
    }

    #[test]
    fn test_placement_reproducible_for_seed() {
        let disc = UniformDiscConfig::default();
        let a = place_uniform_disc(&disc, &mut ChaCha8Rng::seed_from_u64(42));
        let b = place_uniform_disc(&disc, &mut ChaCha8Rng::seed_from_u64(42));
        let c = place_uniform_disc(&disc, &mut ChaCha8Rng::seed_from_u64(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
