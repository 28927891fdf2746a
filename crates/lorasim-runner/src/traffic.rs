//! Traffic generation.

use lorasim_common::{Device, SimTime};
use lorasim_model::{PayloadRange, TrafficConfig};
use rand::Rng;

/// One send produced by a traffic source, before sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSend {
    pub timestamp: SimTime,
    pub payload_bytes: usize,
}

/// Produces the send times and payload sizes of a device.
pub trait TrafficSource {
    /// Every send of `device` for the whole run, in time order.
    fn schedule<R: Rng + ?Sized>(&self, device: &Device, rng: &mut R) -> Vec<ScheduledSend>;
}

/// Sends every `period_s` from `start_s` (plus an optional random offset)
/// while the send time is before `stop_s`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicSender {
    pub period_s: f64,
    pub start_s: f64,
    pub stop_s: f64,
    pub payload_bytes: PayloadRange,
    pub random_start_offset: bool,
}

impl From<&TrafficConfig> for PeriodicSender {
    fn from(config: &TrafficConfig) -> Self {
        Self {
            period_s: config.period_s,
            start_s: config.start_s,
            stop_s: config.stop_s,
            payload_bytes: config.payload_bytes,
            random_start_offset: config.random_start_offset,
        }
    }
}

impl TrafficSource for PeriodicSender {
    fn schedule<R: Rng + ?Sized>(&self, _device: &Device, rng: &mut R) -> Vec<ScheduledSend> {
        if !(self.period_s > 0.0) {
            return Vec::new();
        }

        let offset = if self.random_start_offset {
            rng.gen_range(0.0..self.period_s)
        } else {
            0.0
        };
        let first = self.start_s + offset;
        let (min, max) = (
            self.payload_bytes.min.min(self.payload_bytes.max),
            self.payload_bytes.min.max(self.payload_bytes.max),
        );

        let mut sends = Vec::new();
        let mut k = 0u64;
        loop {
            let t = first + k as f64 * self.period_s;
            if t >= self.stop_s {
                break;
            }
            let payload_bytes = rng.gen_range(min..=max);
            sends.push(ScheduledSend {
                timestamp: SimTime::from_secs(t),
                payload_bytes,
            });
            k += 1;
        }
        sends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorasim_common::{DataRate, NodeName, Position};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn device() -> Device {
        Device {
            name: NodeName::new("dev0").unwrap(),
            position: Position::ORIGIN,
            tx_power_dbm: 14.0,
            data_rate: DataRate::DR5,
            gateway: NodeName::new("gw0").unwrap(),
        }
    }

    fn sender(random_start_offset: bool) -> PeriodicSender {
        PeriodicSender::from(&TrafficConfig {
            random_start_offset,
            ..Default::default()
        })
    }

    #[test]
    fn test_fixed_schedule_one_hour() {
        let sends = sender(false).schedule(&device(), &mut ChaCha8Rng::seed_from_u64(0));
        let times: Vec<f64> = sends.iter().map(|s| s.timestamp.as_secs_f64()).collect();
        assert_eq!(times, [0.0, 600.0, 1200.0, 1800.0, 2400.0, 3000.0]);
        assert!(sends.iter().all(|s| (10..=50).contains(&s.payload_bytes)));
    }

    #[test]
    fn test_random_offset_within_first_period() {
        for seed in 0..50 {
            let sends = sender(true).schedule(&device(), &mut ChaCha8Rng::seed_from_u64(seed));
            let first = sends[0].timestamp.as_secs_f64();
            assert!((0.0..600.0).contains(&first));
            assert_eq!(sends.len(), 6);
            assert!(sends.last().unwrap().timestamp < SimTime::from_secs(3600.0));
        }
    }

    #[test]
    fn test_empty_window() {
        let sender = PeriodicSender {
            start_s: 100.0,
            stop_s: 100.0,
            ..sender(false)
        };
        assert!(sender.schedule(&device(), &mut ChaCha8Rng::seed_from_u64(0)).is_empty());
    }

    #[test]
    fn test_fixed_payload() {
        let sender = PeriodicSender {
            payload_bytes: PayloadRange { min: 23, max: 23 },
            ..sender(false)
        };
        let sends = sender.schedule(&device(), &mut ChaCha8Rng::seed_from_u64(0));
        assert!(sends.iter().all(|s| s.payload_bytes == 23));
    }
}
