//! Thermal noise floor.

/// Boltzmann constant (J/K), at the precision used by the reference model.
pub const BOLTZMANN_J_PER_K: f64 = 1.38e-23;

/// Offset between Celsius and Kelvin.
pub const ZERO_CELSIUS_K: f64 = 273.15;

/// Noise floor in dBm from temperature, bandwidth and receiver noise figure.
///
/// `P = k * T * B` watts, converted to dBm, plus the noise figure.
pub fn compute_noise_floor_dbm(temperature_c: f64, bandwidth_hz: f64, noise_figure_db: f64) -> f64 {
    let temperature_k = temperature_c + ZERO_CELSIUS_K;
    let noise_power_w = BOLTZMANN_J_PER_K * temperature_k * bandwidth_hz;
    10.0 * noise_power_w.log10() + 30.0 + noise_figure_db
}
