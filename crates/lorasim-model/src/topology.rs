//! Resolved network topology.

use crate::{DeviceConfig, GatewayConfig, ModelError};
use lorasim_common::{Device, Gateway, NodeName, Position, TopologyProvider};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Gateways and devices with resolved names, positions and gateway links.
///
/// Device iteration follows configuration order (explicit devices first,
/// then generated ones), which is also the order used to derive per-device
/// random streams.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    gateways: BTreeMap<NodeName, Gateway>,
    devices: BTreeMap<NodeName, Device>,
    device_order: Vec<NodeName>,
}

impl Topology {
    /// Resolve gateway and device configurations into a topology.
    ///
    /// Names must be unique across gateways and devices. A device without an
    /// explicit gateway is linked to the nearest one.
    pub fn build(gateways: &[GatewayConfig], devices: &[DeviceConfig]) -> Result<Self, ModelError> {
        if gateways.is_empty() {
            return Err(ModelError::NoGateways);
        }

        let mut topology = Topology::default();
        let mut seen = BTreeSet::new();

        for gw in gateways {
            let name = NodeName::new(gw.name.as_str())?;
            if !seen.insert(name.clone()) {
                return Err(ModelError::DuplicateNode(gw.name.clone()));
            }
            if !gw.position.is_finite() {
                return Err(ModelError::InvalidConfig(format!(
                    "Gateway '{}' has a non-finite position",
                    gw.name
                )));
            }
            topology.gateways.insert(
                name.clone(),
                Gateway {
                    name,
                    position: gw.position,
                },
            );
        }

        for dev in devices {
            let name = NodeName::new(dev.name.as_str())?;
            if !seen.insert(name.clone()) {
                return Err(ModelError::DuplicateNode(dev.name.clone()));
            }
            if !dev.position.is_finite() {
                return Err(ModelError::InvalidConfig(format!(
                    "Device '{}' has a non-finite position",
                    dev.name
                )));
            }
            if !dev.tx_power_dbm.is_finite() {
                return Err(ModelError::InvalidConfig(format!(
                    "Device '{}' has a non-finite transmit power",
                    dev.name
                )));
            }

            let assigned = match &dev.gateway {
                Some(gw_name) => topology
                    .gateways
                    .values()
                    .find(|g| g.name.as_str() == gw_name)
                    .ok_or_else(|| ModelError::UnknownGateway {
                        device: dev.name.clone(),
                        gateway: gw_name.clone(),
                    })?,
                None => topology
                    .nearest_gateway(&dev.position)
                    .ok_or(ModelError::NoGateways)?,
            };
            let gateway = assigned.name.clone();
            let distance = dev.position.distance_to(&assigned.position);
            if distance == 0.0 {
                warn!(device = %name, gateway = %gateway, "Device placed exactly on its gateway");
            }
            debug!(
                device = %name,
                position = %dev.position,
                gateway = %gateway,
                distance_m = distance,
                data_rate = %dev.data_rate,
                "Device resolved"
            );

            topology.device_order.push(name.clone());
            topology.devices.insert(
                name.clone(),
                Device {
                    name,
                    position: dev.position,
                    tx_power_dbm: dev.tx_power_dbm,
                    data_rate: dev.data_rate,
                    gateway,
                },
            );
        }

        Ok(topology)
    }

    /// Devices in configuration order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> + '_ {
        self.device_order.iter().filter_map(|n| self.devices.get(n))
    }

    /// Gateways in name order.
    pub fn gateways(&self) -> impl Iterator<Item = &Gateway> + '_ {
        self.gateways.values()
    }

    pub fn device_count(&self) -> usize {
        self.device_order.len()
    }

    pub fn gateway_count(&self) -> usize {
        self.gateways.len()
    }

    /// The gateway closest to `position`. Ties go to the lowest name.
    pub fn nearest_gateway(&self, position: &Position) -> Option<&Gateway> {
        self.gateways.values().fold(None, |best: Option<&Gateway>, gw| match best {
            Some(b) if b.position.distance_to(position) <= gw.position.distance_to(position) => Some(b),
            _ => Some(gw),
        })
    }
}

impl TopologyProvider for Topology {
    fn position_of(&self, name: &NodeName) -> Option<Position> {
        self.devices
            .get(name)
            .map(|d| d.position)
            .or_else(|| self.gateways.get(name).map(|g| g.position))
    }

    fn device(&self, name: &NodeName) -> Option<&Device> {
        self.devices.get(name)
    }

    fn gateway(&self, name: &NodeName) -> Option<&Gateway> {
        self.gateways.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorasim_common::DataRate;

    fn gw(name: &str, x: f64) -> GatewayConfig {
        GatewayConfig {
            name: name.to_string(),
            position: Position::new(x, 0.0, 15.0),
        }
    }

    fn dev(name: &str, x: f64, gateway: Option<&str>) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            position: Position::new(x, 0.0, 0.0),
            tx_power_dbm: 14.0,
            data_rate: DataRate::DR5,
            gateway: gateway.map(str::to_string),
        }
    }

    #[test]
    fn test_nearest_gateway_assignment() {
        let topology = Topology::build(
            &[gw("west", -1000.0), gw("east", 1000.0)],
            &[dev("a", -200.0, None), dev("b", 300.0, None), dev("c", 300.0, Some("west"))],
        )
        .unwrap();

        let name = |s: &str| NodeName::new(s).unwrap();
        assert_eq!(topology.device(&name("a")).unwrap().gateway, name("west"));
        assert_eq!(topology.device(&name("b")).unwrap().gateway, name("east"));
        assert_eq!(topology.device(&name("c")).unwrap().gateway, name("west"));
    }

    #[test]
    fn test_nearest_gateway_tie_uses_name_order() {
        let topology = Topology::build(&[gw("b", 100.0), gw("a", -100.0)], &[]).unwrap();
        assert_eq!(topology.nearest_gateway(&Position::ORIGIN).unwrap().name.as_str(), "a");
    }

    #[test]
    fn test_devices_keep_config_order() {
        let topology = Topology::build(
            &[gw("gw0", 0.0)],
            &[dev("zeta", 1.0, None), dev("alpha", 2.0, None), dev("mid", 3.0, None)],
        )
        .unwrap();
        let names: Vec<&str> = topology.devices().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(topology.device_count(), 3);
        assert_eq!(topology.gateway_count(), 1);
    }

    #[test]
    fn test_duplicate_names_rejected_across_kinds() {
        let err = Topology::build(&[gw("x", 0.0)], &[dev("x", 5.0, None)]).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateNode(n) if n == "x"));
    }

    #[test]
    fn test_unknown_gateway_rejected() {
        let err = Topology::build(&[gw("gw0", 0.0)], &[dev("d", 5.0, Some("gw9"))]).unwrap_err();
        assert!(matches!(err, ModelError::UnknownGateway { ref gateway, .. } if gateway == "gw9"));
    }

    #[test]
    fn test_no_gateways_rejected() {
        assert!(matches!(
            Topology::build(&[], &[dev("d", 5.0, None)]),
            Err(ModelError::NoGateways)
        ));
    }

    #[test]
    fn test_position_lookup() {
        let topology = Topology::build(&[gw("gw0", 0.0)], &[dev("d", 5.0, None)]).unwrap();
        let name = |s: &str| NodeName::new(s).unwrap();
        assert_eq!(topology.position_of(&name("d")), Some(Position::new(5.0, 0.0, 0.0)));
        assert_eq!(topology.position_of(&name("gw0")), Some(Position::new(0.0, 0.0, 15.0)));
        assert_eq!(topology.position_of(&name("nope")), None);
    }
}
