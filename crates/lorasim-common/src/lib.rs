//! # lorasim-common
//!
//! Common types and traits for the lorasim LoRa channel simulator.
//!
//! This crate provides the data model shared by every other crate:
//! - Time representation ([`SimTime`])
//! - Cartesian positions ([`Position`])
//! - Node naming ([`NodeName`])
//! - Radio endpoints ([`Device`], [`Gateway`]) and EU868 data rates ([`DataRate`])
//! - Transmission records ([`Transmission`])
//! - The topology lookup seam ([`TopologyProvider`])
//! - Per-node trace output ([`link_tracer`])

pub mod link_tracer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised when constructing common types.
#[derive(Debug, Error, PartialEq)]
pub enum CommonError {
    /// Data rate index outside DR0..DR5.
    #[error("Invalid data rate DR{0} (EU868 supports DR0-DR5)")]
    InvalidDataRate(u8),

    /// Node name is empty.
    #[error("Node name must not be empty")]
    EmptyName,
}

// ============================================================================
// Time Types
// ============================================================================

/// Simulation time in microseconds since simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Zero time.
    pub const ZERO: SimTime = SimTime(0);

    /// Create from microseconds.
    pub fn from_micros(us: u64) -> Self {
        SimTime(us)
    }

    /// Create from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        SimTime(ms * 1000)
    }

    /// Create from seconds (float). Negative values saturate to zero.
    pub fn from_secs(s: f64) -> Self {
        SimTime((s.max(0.0) * 1_000_000.0) as u64)
    }

    /// Get as microseconds.
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get as milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0 / 1000
    }

    /// Get as seconds (float).
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Add duration to time.
    pub fn checked_add(&self, duration: SimTime) -> Option<SimTime> {
        self.0.checked_add(duration.0).map(SimTime)
    }
}

impl std::ops::Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Self) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Self) -> Self::Output {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Cartesian position in meters.
///
/// Assigned once by the topology and never moved afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    /// X coordinate (m).
    pub x: f64,
    /// Y coordinate (m).
    pub y: f64,
    /// Z coordinate, i.e. height (m).
    pub z: f64,
}

impl Position {
    /// The origin.
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    /// Euclidean distance to another position in meters. Always `>= 0`.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Position {
    fn from(v: [f64; 3]) -> Self {
        Position::new(v[0], v[1], v[2])
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        [p.x, p.y, p.z]
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

// ============================================================================
// Node Types
// ============================================================================

/// Unique, human-readable name of a device or gateway.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    /// Create a node name, rejecting empty strings.
    pub fn new(name: impl Into<String>) -> Result<Self, CommonError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CommonError::EmptyName);
        }
        Ok(NodeName(name))
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// EU868 LoRaWAN data rate index.
///
/// DR0 through DR5 map to spreading factors SF12 through SF7 at 125 kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DataRate(u8);

impl DataRate {
    /// SF12.
    pub const DR0: DataRate = DataRate(0);
    /// SF11.
    pub const DR1: DataRate = DataRate(1);
    /// SF10.
    pub const DR2: DataRate = DataRate(2);
    /// SF9.
    pub const DR3: DataRate = DataRate(3);
    /// SF8.
    pub const DR4: DataRate = DataRate(4);
    /// SF7.
    pub const DR5: DataRate = DataRate(5);

    /// Highest EU868 125 kHz data rate (SF7).
    pub const MAX: DataRate = DataRate::DR5;

    /// Create a data rate, rejecting indices above DR5.
    pub fn new(index: u8) -> Result<Self, CommonError> {
        if index > Self::MAX.0 {
            return Err(CommonError::InvalidDataRate(index));
        }
        Ok(DataRate(index))
    }

    /// The raw DR index.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Spreading factor for this data rate.
    pub fn spreading_factor(&self) -> u8 {
        12 - self.0
    }
}

impl Default for DataRate {
    fn default() -> Self {
        DataRate::MAX
    }
}

impl TryFrom<u8> for DataRate {
    type Error = CommonError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DataRate::new(value)
    }
}

impl From<DataRate> for u8 {
    fn from(dr: DataRate) -> Self {
        dr.0
    }
}

impl std::fmt::Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DR{} (SF{})", self.0, self.spreading_factor())
    }
}

/// An end device that originates transmissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device name.
    pub name: NodeName,
    /// Fixed position.
    pub position: Position,
    /// Configured transmit power in dBm.
    pub tx_power_dbm: f64,
    /// Configured data rate.
    pub data_rate: DataRate,
    /// Gateway this device transmits to.
    pub gateway: NodeName,
}

/// A receiving gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gateway {
    /// Unique gateway name.
    pub name: NodeName,
    /// Fixed position.
    pub position: Position,
}

/// A single send event produced by a traffic source.
///
/// Consumed exactly once by the channel evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    /// Monotonic sequence number, unique within a run.
    pub sequence: u64,
    /// Sending device.
    pub sender: NodeName,
    /// Intended receiving gateway.
    pub receiver: NodeName,
    /// Transmit power in dBm.
    pub tx_power_dbm: f64,
    /// Payload size in bytes.
    pub payload_bytes: usize,
    /// Simulated send time.
    pub timestamp: SimTime,
}

// ============================================================================
// Topology
// ============================================================================

/// Supplies node positions by name.
///
/// Positions are immutable for the lifetime of a run.
pub trait TopologyProvider {
    /// Position of the device or gateway with the given name.
    fn position_of(&self, name: &NodeName) -> Option<Position>;

    /// Look up a device by name.
    fn device(&self, name: &NodeName) -> Option<&Device>;

    /// Look up a gateway by name.
    fn gateway(&self, name: &NodeName) -> Option<&Gateway>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_3d() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 12.0);
        assert_eq!(a.distance_to(&b), 13.0);
        assert_eq!(b.distance_to(&a), 13.0);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_position_yaml_array_form() {
        let p: Position = serde_json::from_str("[1.5, -2.0, 15.0]").unwrap();
        assert_eq!(p, Position::new(1.5, -2.0, 15.0));
        assert_eq!(serde_json::to_string(&p).unwrap(), "[1.5,-2.0,15.0]");
    }

    #[test]
    fn test_data_rate_spreading_factor() {
        assert_eq!(DataRate::new(5).unwrap().spreading_factor(), 7);
        assert_eq!(DataRate::new(3).unwrap().spreading_factor(), 9);
        assert_eq!(DataRate::new(1).unwrap().spreading_factor(), 11);
        assert_eq!(DataRate::new(0).unwrap().spreading_factor(), 12);
        assert_eq!(DataRate::new(6), Err(CommonError::InvalidDataRate(6)));
    }

    #[test]
    fn test_node_name_rejects_empty() {
        assert_eq!(NodeName::new("  "), Err(CommonError::EmptyName));
        assert_eq!(NodeName::new("gw0").unwrap().as_str(), "gw0");
    }

    #[test]
    fn test_sim_time_conversions() {
        let t = SimTime::from_secs(600.0);
        assert_eq!(t.as_micros(), 600_000_000);
        assert_eq!(t.as_millis(), 600_000);
        assert_eq!(SimTime::from_secs(-1.0), SimTime::ZERO);
        assert_eq!(SimTime::from_millis(5) - SimTime::from_millis(10), SimTime::ZERO);
        assert_eq!(format!("{}", SimTime::from_millis(1500)), "1.500s");
    }
}
