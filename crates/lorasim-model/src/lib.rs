//! # lorasim-model
//!
//! YAML scenario loading and topology building for lorasim.
//!
//! This crate provides:
//! - YAML schema types for scenarios ([`Model`] and its sections)
//! - Loading from files and strings with fail-fast validation
//! - Topology resolution with seeded uniform-disc placement
//! - Seed derivation for independent random streams ([`SeedStream`])
//!
//! Every section of a scenario is optional; omitted values take the
//! defaults documented on each type's `Default` impl.

pub mod placement;
pub mod topology;

pub use topology::Topology;

use lorasim_channel::{ChannelParameters, ConfigError, EvaluationOptions, NoiseSource};
use lorasim_common::{CommonError, DataRate, Position};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Shortest traffic period. Timestamps have microsecond resolution.
pub const MIN_PERIOD_S: f64 = 1e-6;

/// Upper bound on the number of transmissions a scenario may schedule.
pub const MAX_SCHEDULED_SENDS: u64 = 10_000_000;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading or resolving a scenario.
#[derive(Debug, Error)]
pub enum ModelError {
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Channel parameters failed validation.
    #[error("Invalid channel configuration: {0}")]
    InvalidChannel(#[from] ConfigError),

    /// Invalid node name or data rate.
    #[error("Invalid node: {0}")]
    InvalidNode(#[from] CommonError),

    /// Duplicate node name.
    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    /// A device references a gateway that does not exist.
    #[error("Device '{device}' references unknown gateway '{gateway}'")]
    UnknownGateway {
        /// Device name.
        device: String,
        /// Referenced gateway name.
        gateway: String,
    },

    /// The scenario has no gateways.
    #[error("Scenario defines no gateways")]
    NoGateways,

    /// Invalid placement parameters.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Invalid traffic parameters.
    #[error("Invalid traffic: {0}")]
    InvalidTraffic(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Random Streams
// ============================================================================

/// How channel randomness is divided between devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngStreams {
    /// One stream per device; evaluation order across devices is irrelevant.
    #[default]
    PerDevice,
    /// A single stream consumed in timestamp order.
    Shared,
}

/// Independent consumers of randomness within a run.
///
/// Each stream is seeded from the scenario seed with its own offset, so
/// changing how one stream is consumed (for example, enabling fading) never
/// perturbs the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStream {
    /// Channel fading samples.
    Channel,
    /// Traffic start offsets and payload sizes.
    Traffic,
    /// Device placement.
    Placement,
}

impl SeedStream {
    const fn offset(self) -> u64 {
        match self {
            SeedStream::Channel => 0,
            SeedStream::Traffic => 1 << 32,
            SeedStream::Placement => 2 << 32,
        }
    }

    /// Seed for the `index`-th instance of this stream.
    pub fn seed(self, base_seed: u64, index: u64) -> u64 {
        base_seed.wrapping_add(self.offset().wrapping_add(index))
    }

    /// A ChaCha8 generator for the `index`-th instance of this stream.
    pub fn rng(self, base_seed: u64, index: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed(base_seed, index))
    }
}

// ============================================================================
// YAML Schema
// ============================================================================

/// `simulation` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Base seed for every random stream.
    pub seed: u64,
}

/// `evaluation` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Noise reference (`thermal` or `fixed_awgn`).
    pub noise_source: NoiseSource,
    /// Whether Rayleigh fading is applied.
    pub fading: bool,
    /// Random stream layout for channel evaluation.
    pub rng_streams: RngStreams,
    /// Evaluate devices concurrently. Requires `per_device` streams.
    pub parallel: bool,
}

impl EvaluationConfig {
    /// The channel evaluation options selected by this section.
    pub fn options(&self) -> EvaluationOptions {
        EvaluationOptions::new(self.noise_source, self.fading)
    }
}

/// An entry of the `gateways` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub name: String,
    pub position: Position,
}

fn default_tx_power_dbm() -> f64 {
    14.0
}

/// An entry of the `devices` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: String,
    pub position: Position,
    #[serde(default = "default_tx_power_dbm")]
    pub tx_power_dbm: f64,
    #[serde(default)]
    pub data_rate: DataRate,
    /// Gateway name. The nearest gateway is used when absent.
    #[serde(default)]
    pub gateway: Option<String>,
}

/// Transmit power and data rate pair assigned to generated devices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadioProfile {
    pub tx_power_dbm: f64,
    pub data_rate: DataRate,
}

/// Devices placed uniformly at random over a disc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniformDiscConfig {
    /// Number of devices to generate.
    pub count: usize,
    /// Disc centre `[x, y]` (m).
    pub center: [f64; 2],
    /// Disc radius (m).
    pub radius_m: f64,
    /// Device height (m).
    pub height_m: f64,
    /// Transmit power when no profiles are listed (dBm).
    pub tx_power_dbm: f64,
    /// Data rate when no profiles are listed.
    pub data_rate: DataRate,
    /// Generated devices are named `{name_prefix}{index}`.
    pub name_prefix: String,
    /// Radio profiles assigned round-robin to generated devices.
    pub profiles: Vec<RadioProfile>,
}

impl Default for UniformDiscConfig {
    fn default() -> Self {
        Self {
            count: 3,
            center: [0.0, 0.0],
            radius_m: 2000.0,
            height_m: 0.0,
            tx_power_dbm: 14.0,
            data_rate: DataRate::DR5,
            name_prefix: "ed".to_string(),
            profiles: Vec::new(),
        }
    }
}

/// `placement` section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementConfig {
    pub uniform_disc: Option<UniformDiscConfig>,
}

/// Inclusive payload size range in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PayloadRange {
    pub min: usize,
    pub max: usize,
}

impl Default for PayloadRange {
    fn default() -> Self {
        Self { min: 10, max: 50 }
    }
}

/// `traffic` section: periodic uplinks from every device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrafficConfig {
    /// Interval between transmissions (s).
    pub period_s: f64,
    /// Time of the first transmission (s).
    pub start_s: f64,
    /// No transmission is sent at or after this time (s).
    pub stop_s: f64,
    pub payload_bytes: PayloadRange,
    /// Delay each device's first transmission by a uniform offset in `[0, period)`.
    pub random_start_offset: bool,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            period_s: 600.0,
            start_s: 0.0,
            stop_s: 3600.0,
            payload_bytes: PayloadRange::default(),
            random_start_offset: true,
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// A parsed scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Model {
    pub simulation: SimulationConfig,
    pub channel: ChannelParameters,
    pub evaluation: EvaluationConfig,
    pub gateways: Vec<GatewayConfig>,
    pub devices: Vec<DeviceConfig>,
    pub placement: PlacementConfig,
    pub traffic: TrafficConfig,
}

impl Model {
    /// Three devices within 2 km of a single gateway mounted at 15 m.
    ///
    /// Devices use DR5 at 14 dBm, DR3 at 10 dBm and DR1 at 6 dBm, send every
    /// ten minutes for an hour with 10 to 50 byte payloads, over a thermal
    /// noise channel with Rayleigh fading.
    pub fn reference_scenario() -> Model {
        Model {
            evaluation: EvaluationConfig {
                noise_source: NoiseSource::Thermal,
                fading: true,
                ..Default::default()
            },
            gateways: vec![GatewayConfig {
                name: "gw0".to_string(),
                position: Position::new(0.0, 0.0, 15.0),
            }],
            placement: PlacementConfig {
                uniform_disc: Some(UniformDiscConfig {
                    count: 3,
                    radius_m: 2000.0,
                    profiles: vec![
                        RadioProfile {
                            tx_power_dbm: 14.0,
                            data_rate: DataRate::DR5,
                        },
                        RadioProfile {
                            tx_power_dbm: 10.0,
                            data_rate: DataRate::DR3,
                        },
                        RadioProfile {
                            tx_power_dbm: 6.0,
                            data_rate: DataRate::DR1,
                        },
                    ],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }
    }

    /// Check every section, failing on the first problem found.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.channel.validate()?;

        if self.evaluation.parallel && self.evaluation.rng_streams == RngStreams::Shared {
            return Err(ModelError::InvalidConfig(
                "parallel evaluation requires rng_streams: per_device".to_string(),
            ));
        }

        if let Some(disc) = &self.placement.uniform_disc {
            if !(disc.radius_m.is_finite() && disc.radius_m >= 0.0) {
                return Err(ModelError::InvalidPlacement(format!(
                    "radius_m must be a finite value >= 0, got {}",
                    disc.radius_m
                )));
            }
            if !(disc.center.iter().all(|c| c.is_finite()) && disc.height_m.is_finite()) {
                return Err(ModelError::InvalidPlacement(
                    "center and height_m must be finite".to_string(),
                ));
            }
            if !disc.tx_power_dbm.is_finite() || disc.profiles.iter().any(|p| !p.tx_power_dbm.is_finite()) {
                return Err(ModelError::InvalidPlacement(
                    "tx_power_dbm must be finite".to_string(),
                ));
            }
        }

        let traffic = &self.traffic;
        if !(traffic.period_s.is_finite() && traffic.period_s >= MIN_PERIOD_S) {
            return Err(ModelError::InvalidTraffic(format!(
                "period_s must be >= {} s, got {}",
                MIN_PERIOD_S, traffic.period_s
            )));
        }
        if !(traffic.start_s.is_finite() && traffic.start_s >= 0.0) {
            return Err(ModelError::InvalidTraffic(format!(
                "start_s must be >= 0, got {}",
                traffic.start_s
            )));
        }
        if !(traffic.stop_s.is_finite() && traffic.stop_s >= traffic.start_s) {
            return Err(ModelError::InvalidTraffic(format!(
                "stop_s ({}) must not precede start_s ({})",
                traffic.stop_s, traffic.start_s
            )));
        }
        if traffic.payload_bytes.min > traffic.payload_bytes.max {
            return Err(ModelError::InvalidTraffic(format!(
                "payload_bytes.min ({}) exceeds max ({})",
                traffic.payload_bytes.min, traffic.payload_bytes.max
            )));
        }

        let device_count = self.devices.len() + self.placement.uniform_disc.as_ref().map_or(0, |d| d.count);
        let sends_per_device = ((traffic.stop_s - traffic.start_s) / traffic.period_s).ceil();
        let total_sends = sends_per_device * device_count as f64;
        if total_sends > MAX_SCHEDULED_SENDS as f64 {
            return Err(ModelError::InvalidTraffic(format!(
                "{} devices sending every {} s for {} s would schedule {:.0} transmissions, limit is {}",
                device_count,
                traffic.period_s,
                traffic.stop_s - traffic.start_s,
                total_sends,
                MAX_SCHEDULED_SENDS
            )));
        }

        self.build_topology().map(|_| ())
    }

    /// Resolve explicit and generated devices against the gateways.
    ///
    /// Generated positions come from the placement stream, so they depend
    /// only on the seed and the placement section.
    pub fn build_topology(&self) -> Result<Topology, ModelError> {
        let mut devices = self.devices.clone();
        if let Some(disc) = &self.placement.uniform_disc {
            let mut rng = SeedStream::Placement.rng(self.simulation.seed, 0);
            devices.extend(placement::place_uniform_disc(disc, &mut rng));
        }
        Topology::build(&self.gateways, &devices)
    }
}

// ============================================================================
// Model Loading
// ============================================================================

/// Load and validate a scenario from a file.
pub fn load_model(path: &Path) -> Result<Model, ModelError> {
    let yaml = std::fs::read_to_string(path)?;
    load_model_from_str(&yaml)
}

/// Parse and validate a scenario from a YAML string.
pub fn load_model_from_str(yaml: &str) -> Result<Model, ModelError> {
    let model: Model = serde_yaml::from_str(yaml)?;
    model.validate()?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorasim_common::{NodeName, TopologyProvider};

    const MINIMAL: &str = r#"
gateways:
  - name: gw0
    position: [0.0, 0.0, 15.0]
devices:
  - name: dev0
    position: [100.0, 0.0, 0.0]
"#;

    #[test]
    fn test_minimal_scenario_defaults() {
        let model = load_model_from_str(MINIMAL).unwrap();
        assert_eq!(model.simulation.seed, 0);
        assert_eq!(model.channel, ChannelParameters::default());
        assert_eq!(model.evaluation.noise_source, NoiseSource::Thermal);
        assert!(!model.evaluation.fading);
        assert_eq!(model.evaluation.rng_streams, RngStreams::PerDevice);
        assert_eq!(model.traffic, TrafficConfig::default());
        assert_eq!(model.devices[0].tx_power_dbm, 14.0);
        assert_eq!(model.devices[0].data_rate, DataRate::DR5);
    }

    #[test]
    fn test_full_scenario() {
        let yaml = r#"
simulation:
  seed: 42
channel:
  path_loss_exponent: 3.5
  awgn_noise_floor_dbm: -95.0
evaluation:
  noise_source: fixed_awgn
  fading: true
  rng_streams: per_device
  parallel: true
gateways:
  - name: gw0
    position: [0.0, 0.0, 15.0]
devices:
  - name: dev0
    position: [100.0, 0.0, 0.0]
    tx_power_dbm: 10.0
    data_rate: 3
    gateway: gw0
placement:
  uniform_disc:
    count: 5
    radius_m: 500.0
    name_prefix: node
traffic:
  period_s: 60.0
  stop_s: 600.0
  payload_bytes: { min: 20, max: 20 }
  random_start_offset: false
"#;
        let model = load_model_from_str(yaml).unwrap();
        assert_eq!(model.simulation.seed, 42);
        assert_eq!(model.channel.path_loss_exponent, 3.5);
        assert_eq!(model.channel.reference_loss_db, 46.6777);
        assert_eq!(model.evaluation.options(), EvaluationOptions::new(NoiseSource::FixedAwgn, true));
        assert!(model.evaluation.parallel);
        assert_eq!(model.devices[0].data_rate, DataRate::DR3);
        assert_eq!(model.traffic.payload_bytes, PayloadRange { min: 20, max: 20 });

        let topology = model.build_topology().unwrap();
        assert_eq!(topology.device_count(), 6);
        assert!(topology.device(&NodeName::new("node4").unwrap()).is_some());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = format!("{MINIMAL}\nchannel:\n  path_los_exponent: 3.0\n");
        assert!(matches!(load_model_from_str(&yaml), Err(ModelError::YamlError(_))));
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let yaml = format!("{MINIMAL}\nchannel:\n  bandwidth_hz: 0.0\n");
        assert!(matches!(
            load_model_from_str(&yaml),
            Err(ModelError::InvalidChannel(ConfigError::NonPositiveBandwidth(_)))
        ));
    }

    #[test]
    fn test_invalid_data_rate_rejected() {
        let yaml = r#"
gateways:
  - name: gw0
    position: [0.0, 0.0, 15.0]
devices:
  - name: dev0
    position: [1.0, 0.0, 0.0]
    data_rate: 7
"#;
        assert!(matches!(load_model_from_str(yaml), Err(ModelError::YamlError(_))));
    }

    #[test]
    fn test_parallel_requires_per_device_streams() {
        let yaml = format!("{MINIMAL}\nevaluation:\n  rng_streams: shared\n  parallel: true\n");
        assert!(matches!(load_model_from_str(&yaml), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_traffic_validation() {
        let mut model = load_model_from_str(MINIMAL).unwrap();
        model.traffic.stop_s = -1.0;
        assert!(matches!(model.validate(), Err(ModelError::InvalidTraffic(_))));

        let mut model = load_model_from_str(MINIMAL).unwrap();
        model.traffic.period_s = 0.0;
        assert!(matches!(model.validate(), Err(ModelError::InvalidTraffic(_))));

        let mut model = load_model_from_str(MINIMAL).unwrap();
        model.traffic.payload_bytes = PayloadRange { min: 51, max: 50 };
        assert!(matches!(model.validate(), Err(ModelError::InvalidTraffic(_))));

        let mut model = load_model_from_str(MINIMAL).unwrap();
        model.traffic.stop_s = model.traffic.start_s;
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_traffic_volume_is_bounded() {
        let mut model = Model::reference_scenario();
        model.traffic.period_s = 1e-9;
        assert!(matches!(model.validate(), Err(ModelError::InvalidTraffic(_))));

        // 3 devices every 1 ms for an hour is 10.8 million sends
        let mut model = Model::reference_scenario();
        model.traffic.period_s = 1e-3;
        assert!(matches!(model.validate(), Err(ModelError::InvalidTraffic(_))));

        let mut model = Model::reference_scenario();
        model.traffic.period_s = MIN_PERIOD_S;
        model.traffic.stop_s = 1.0;
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut model = Model::reference_scenario();
        if let Some(disc) = model.placement.uniform_disc.as_mut() {
            disc.radius_m = -1.0;
        }
        assert!(matches!(model.validate(), Err(ModelError::InvalidPlacement(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_model(Path::new("/nonexistent/lorasim/scenario.yaml")).unwrap_err();
        assert!(matches!(err, ModelError::IoError(_)));
    }

    #[test]
    fn test_reference_scenario() {
        let model = Model::reference_scenario();
        assert!(model.validate().is_ok());

        let topology = model.build_topology().unwrap();
        let devices: Vec<_> = topology.devices().collect();
        assert_eq!(devices.len(), 3);
        assert_eq!(
            devices.iter().map(|d| (d.tx_power_dbm, d.data_rate)).collect::<Vec<_>>(),
            [(14.0, DataRate::DR5), (10.0, DataRate::DR3), (6.0, DataRate::DR1)]
        );
        let gw = Position::new(0.0, 0.0, 15.0);
        for d in devices {
            assert_eq!(d.gateway.as_str(), "gw0");
            assert!(Position::new(d.position.x, d.position.y, 15.0).distance_to(&gw) <= 2000.0);
        }
    }

    #[test]
    fn test_placement_independent_of_fading() {
        let mut with_fading = Model::reference_scenario();
        with_fading.simulation.seed = 9;
        let mut without = with_fading.clone();
        without.evaluation.fading = false;

        let a: Vec<_> = with_fading.build_topology().unwrap().devices().map(|d| d.position).collect();
        let b: Vec<_> = without.build_topology().unwrap().devices().map(|d| d.position).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_streams_are_distinct() {
        let seed = 7;
        assert_eq!(SeedStream::Channel.seed(seed, 2), 9);
        assert_ne!(SeedStream::Channel.seed(seed, 0), SeedStream::Traffic.seed(seed, 0));
        assert_ne!(SeedStream::Traffic.seed(seed, 0), SeedStream::Placement.seed(seed, 0));
        assert_eq!(SeedStream::Placement.seed(u64::MAX, 1), (2u64 << 32));
    }

    #[test]
    fn test_model_round_trips_through_yaml() {
        let model = Model::reference_scenario();
        let yaml = serde_yaml::to_string(&model).unwrap();
        assert_eq!(load_model_from_str(&yaml).unwrap(), model);
    }
}
