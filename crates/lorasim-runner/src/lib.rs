//! # lorasim-runner library
//!
//! Runs a scenario end to end: generates periodic traffic for every device,
//! feeds each transmission to the channel evaluator in timestamp order and
//! collects delivery statistics.
//!
//! ## Random Streams
//!
//! Traffic, placement and channel fading draw from separate seeded streams.
//! With `per_device` channel streams each device owns its fading stream, so
//! device batches can be evaluated concurrently with rayon. Outcomes are
//! merged back by sequence number, making parallel output bit-identical to
//! the sequential run. With a `shared` stream, evaluation is strictly
//! sequential in (timestamp, sequence) order.

pub mod metrics_export;
pub mod stats;
pub mod traffic;

pub use lorasim_model::{load_model, load_model_from_str, Model};
pub use metrics_export::{InMemoryRecorder, MetricsSnapshot};
pub use stats::{DeliveryStats, SnrStats};
pub use traffic::{PeriodicSender, ScheduledSend, TrafficSource};

use chrono::{DateTime, Utc};
use lorasim_channel::{ChannelEvaluator, ChannelOutcome, ConfigError, NoiseSource};
use lorasim_common::link_tracer::{LinkTracer, TraceEvent};
use lorasim_common::{DataRate, NodeName, Position, SimTime, TopologyProvider, Transmission};
use lorasim_metrics::{metric_defs, MetricLabels};
use lorasim_model::{ModelError, RngStreams, SeedStream, Topology};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while running a scenario.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Model error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Channel configuration error.
    #[error("Channel configuration error: {0}")]
    Channel(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A transmission names a node the topology does not know.
    #[error("Unknown node: {0}")]
    UnknownNode(String),
}

// ============================================================================
// Reports
// ============================================================================

/// One evaluated transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmissionRecord {
    pub sequence: u64,
    pub device: NodeName,
    pub gateway: NodeName,
    pub timestamp: SimTime,
    pub payload_bytes: usize,
    pub outcome: ChannelOutcome,
}

/// Per-device summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    pub name: NodeName,
    pub gateway: NodeName,
    pub position: Position,
    pub data_rate: DataRate,
    pub spreading_factor: u8,
    pub tx_power_dbm: f64,
    pub distance_m: f64,
    pub delivery: DeliveryStats,
    pub delivery_ratio_percent: f64,
    pub snr: SnrStats,
}

/// Result of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub started_at: DateTime<Utc>,
    pub seed: u64,
    pub noise_source: NoiseSource,
    pub fading: bool,
    pub rng_streams: RngStreams,
    pub parallel: bool,
    pub noise_floor_dbm: f64,
    pub snr_threshold_db: f64,
    pub totals: DeliveryStats,
    pub delivery_ratio_percent: f64,
    pub snr: SnrStats,
    pub devices: Vec<DeviceReport>,
    pub wall_time_ms: u64,
    /// Every evaluated transmission in sequence order.
    #[serde(skip)]
    pub records: Vec<TransmissionRecord>,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Seed {} | noise {} ({:.2} dBm, threshold {:.1} dB) | fading {}",
            self.seed,
            self.noise_source,
            self.noise_floor_dbm,
            self.snr_threshold_db,
            if self.fading { "on" } else { "off" }
        )?;
        writeln!(f, "Packets sent:      {}", self.totals.sent)?;
        writeln!(f, "Packets delivered: {}", self.totals.delivered)?;
        writeln!(f, "Delivery ratio:    {:.2}%", self.delivery_ratio_percent)?;
        writeln!(f)?;
        for d in &self.devices {
            writeln!(
                f,
                "  {:<10} {} {:>5.1} dBm at {} -> {} {:>7.1} m: {}/{} delivered ({:.2}%){}",
                d.name.as_str(),
                d.data_rate,
                d.tx_power_dbm,
                d.position,
                d.gateway,
                d.distance_m,
                d.delivery.delivered,
                d.delivery.sent,
                d.delivery_ratio_percent,
                match d.snr.mean_db {
                    Some(mean) => format!(", mean SNR {:.2} dB", mean),
                    None => String::new(),
                }
            )?;
        }
        Ok(())
    }
}

/// Result of probing one link with repeated evaluations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkProbe {
    pub distance_m: f64,
    pub tx_power_dbm: f64,
    pub path_loss_db: f64,
    pub noise_floor_dbm: f64,
    pub snr_threshold_db: f64,
    pub delivery: DeliveryStats,
    pub success_fraction: f64,
    pub snr: SnrStats,
}

/// Evaluate one link `samples` times from a single seeded stream.
///
/// Fails if the distance is negative or not finite, or if the transmit
/// power is not finite.
pub fn probe_link(
    evaluator: &ChannelEvaluator,
    tx_power_dbm: f64,
    distance_m: f64,
    samples: u32,
    seed: u64,
) -> Result<LinkProbe, RunnerError> {
    if !(distance_m.is_finite() && distance_m >= 0.0) {
        return Err(ConfigError::InvalidDistance(distance_m).into());
    }
    if !tx_power_dbm.is_finite() {
        return Err(ConfigError::NonFinite {
            field: "tx_power_dbm",
            value: tx_power_dbm,
        }
        .into());
    }

    let mut rng = SeedStream::Channel.rng(seed, 0);
    let mut delivery = DeliveryStats::default();
    let mut snr = SnrStats::default();
    let mut path_loss_db = 0.0;

    for _ in 0..samples {
        let outcome = evaluator.evaluate_link(tx_power_dbm, distance_m, &mut rng);
        path_loss_db = outcome.path_loss_db;
        delivery.record(outcome.success);
        snr.record(outcome.snr_db);
    }

    Ok(LinkProbe {
        distance_m,
        tx_power_dbm,
        path_loss_db,
        noise_floor_dbm: evaluator.noise_floor_dbm(),
        snr_threshold_db: evaluator.snr_threshold_db(),
        success_fraction: delivery.delivery_ratio_percent() / 100.0,
        delivery,
        snr,
    })
}

/// Sender and receiver positions of a transmission.
pub fn resolve_link<T: TopologyProvider>(
    topology: &T,
    transmission: &Transmission,
) -> Result<(Position, Position), RunnerError> {
    let sender = topology
        .device(&transmission.sender)
        .map(|d| d.position)
        .ok_or_else(|| RunnerError::UnknownNode(transmission.sender.to_string()))?;
    let receiver = topology
        .gateway(&transmission.receiver)
        .map(|g| g.position)
        .ok_or_else(|| RunnerError::UnknownNode(transmission.receiver.to_string()))?;
    Ok((sender, receiver))
}

// ============================================================================
// Simulation Runner
// ============================================================================

/// A validated scenario ready to run.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    model: Model,
    topology: Topology,
    evaluator: ChannelEvaluator,
    tracer: LinkTracer,
}

impl SimulationRunner {
    /// Validate the model, resolve its topology and build the evaluator.
    pub fn new(model: Model) -> Result<Self, RunnerError> {
        model.validate()?;
        let topology = model.build_topology()?;
        let evaluator = ChannelEvaluator::new(model.channel, model.evaluation.options())?;
        Ok(Self {
            model,
            topology,
            evaluator,
            tracer: LinkTracer::disabled(),
        })
    }

    /// Attach a per-node tracer.
    pub fn with_tracer(mut self, tracer: LinkTracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn evaluator(&self) -> &ChannelEvaluator {
        &self.evaluator
    }

    /// Every transmission of the run, sorted by timestamp then device order
    /// and numbered in that order.
    pub fn schedule(&self) -> Vec<Transmission> {
        let sender = PeriodicSender::from(&self.model.traffic);
        let seed = self.model.simulation.seed;

        let mut pending = Vec::new();
        for (index, device) in self.topology.devices().enumerate() {
            let mut rng = SeedStream::Traffic.rng(seed, index as u64);
            for send in sender.schedule(device, &mut rng) {
                pending.push((send.timestamp, index, send.payload_bytes, device));
            }
        }
        pending.sort_by_key(|&(timestamp, index, _, _)| (timestamp, index));

        pending
            .into_iter()
            .enumerate()
            .map(|(sequence, (timestamp, _, payload_bytes, device))| Transmission {
                sequence: sequence as u64,
                sender: device.name.clone(),
                receiver: device.gateway.clone(),
                tx_power_dbm: device.tx_power_dbm,
                payload_bytes,
                timestamp,
            })
            .collect()
    }

    /// Evaluate transmissions, returning outcomes aligned with the input.
    pub fn evaluate(&self, transmissions: &[Transmission]) -> Result<Vec<ChannelOutcome>, RunnerError> {
        let links = transmissions
            .iter()
            .map(|tx| resolve_link(&self.topology, tx))
            .collect::<Result<Vec<_>, _>>()?;
        let seed = self.model.simulation.seed;

        let mut order: Vec<usize> = (0..transmissions.len()).collect();
        order.sort_by_key(|&i| (transmissions[i].timestamp, transmissions[i].sequence));

        let mut outcomes: Vec<Option<ChannelOutcome>> = vec![None; transmissions.len()];

        match self.model.evaluation.rng_streams {
            RngStreams::Shared => {
                let mut rng = SeedStream::Channel.rng(seed, 0);
                for i in order {
                    let (sender, receiver) = links[i];
                    outcomes[i] = Some(self.evaluator.evaluate(&transmissions[i], sender, receiver, &mut rng));
                }
            }
            RngStreams::PerDevice => {
                let mut by_sender: BTreeMap<&NodeName, Vec<usize>> = BTreeMap::new();
                for i in order {
                    by_sender.entry(&transmissions[i].sender).or_default().push(i);
                }
                let batches: Vec<(u64, Vec<usize>)> = self
                    .topology
                    .devices()
                    .enumerate()
                    .filter_map(|(index, d)| by_sender.remove(&d.name).map(|idx| (index as u64, idx)))
                    .collect();

                let evaluate_batch = |(stream, indices): &(u64, Vec<usize>)| -> Vec<(usize, ChannelOutcome)> {
                    let mut rng = SeedStream::Channel.rng(seed, *stream);
                    indices
                        .iter()
                        .map(|&i| {
                            let (sender, receiver) = links[i];
                            (i, self.evaluator.evaluate(&transmissions[i], sender, receiver, &mut rng))
                        })
                        .collect()
                };

                let evaluated: Vec<Vec<(usize, ChannelOutcome)>> = if self.model.evaluation.parallel {
                    debug!(batches = batches.len(), threads = rayon::current_num_threads(), "Parallel evaluation");
                    batches.par_iter().map(evaluate_batch).collect()
                } else {
                    batches.iter().map(evaluate_batch).collect()
                };

                for (i, outcome) in evaluated.into_iter().flatten() {
                    outcomes[i] = Some(outcome);
                }
            }
        }

        outcomes
            .into_iter()
            .zip(transmissions)
            .map(|(outcome, tx)| outcome.ok_or_else(|| RunnerError::UnknownNode(tx.sender.to_string())))
            .collect()
    }

    /// Run the scenario and summarise deliveries.
    pub fn run(&self) -> Result<SimulationReport, RunnerError> {
        let started_at = Utc::now();
        let wall_start = Instant::now();
        let evaluation = self.model.evaluation;

        info!(
            seed = self.model.simulation.seed,
            devices = self.topology.device_count(),
            gateways = self.topology.gateway_count(),
            noise_source = %evaluation.noise_source,
            fading = evaluation.fading,
            rng_streams = ?evaluation.rng_streams,
            parallel = evaluation.parallel,
            "Starting simulation"
        );
        self.trace_topology();

        let transmissions = self.schedule();
        let outcomes = self.evaluate(&transmissions)?;

        let noise_label = self.evaluator.noise_source().as_str();
        let mut snr = SnrStats::default();
        let mut per_device: BTreeMap<NodeName, (DeliveryStats, SnrStats)> = BTreeMap::new();
        let mut records = Vec::with_capacity(transmissions.len());

        for (tx, outcome) in transmissions.into_iter().zip(outcomes) {
            self.record_metrics(&tx, &outcome, noise_label);
            self.trace_outcome(&tx, &outcome);

            snr.record(outcome.snr_db);
            let (device_delivery, device_snr) = per_device.entry(tx.sender.clone()).or_default();
            device_delivery.record(outcome.success);
            device_snr.record(outcome.snr_db);

            records.push(TransmissionRecord {
                sequence: tx.sequence,
                device: tx.sender,
                gateway: tx.receiver,
                timestamp: tx.timestamp,
                payload_bytes: tx.payload_bytes,
                outcome,
            });
        }

        let totals = per_device
            .values()
            .fold(DeliveryStats::default(), |mut totals, (delivery, _)| {
                totals.merge(delivery);
                totals
            });
        let delivery_ratio_percent = totals.delivery_ratio_percent();
        metrics::gauge!(metric_defs::DELIVERY_RATIO.name).set(delivery_ratio_percent);

        let devices = self
            .topology
            .devices()
            .map(|d| {
                let (delivery, snr) = per_device.get(&d.name).copied().unwrap_or_default();
                DeviceReport {
                    name: d.name.clone(),
                    gateway: d.gateway.clone(),
                    position: d.position,
                    data_rate: d.data_rate,
                    spreading_factor: d.data_rate.spreading_factor(),
                    tx_power_dbm: d.tx_power_dbm,
                    distance_m: self
                        .topology
                        .position_of(&d.gateway)
                        .map_or(0.0, |gw| d.position.distance_to(&gw)),
                    delivery,
                    delivery_ratio_percent: delivery.delivery_ratio_percent(),
                    snr,
                }
            })
            .collect();

        info!(
            sent = totals.sent,
            delivered = totals.delivered,
            lost = totals.lost,
            delivery_ratio_percent,
            "Simulation complete"
        );

        Ok(SimulationReport {
            started_at,
            seed: self.model.simulation.seed,
            noise_source: evaluation.noise_source,
            fading: evaluation.fading,
            rng_streams: evaluation.rng_streams,
            parallel: evaluation.parallel,
            noise_floor_dbm: self.evaluator.noise_floor_dbm(),
            snr_threshold_db: self.evaluator.snr_threshold_db(),
            totals,
            delivery_ratio_percent,
            snr,
            devices,
            wall_time_ms: wall_start.elapsed().as_millis() as u64,
            records,
        })
    }

    fn record_metrics(&self, tx: &Transmission, outcome: &ChannelOutcome, noise_label: &str) {
        let labels = MetricLabels::new(tx.sender.as_str(), tx.receiver.as_str(), noise_label).to_labels();

        metrics::counter!(metric_defs::CHANNEL_TX_PACKETS.name, &labels).increment(1);
        metrics::histogram!(metric_defs::CHANNEL_RX_SNR.name, &labels).record(outcome.snr_db);
        metrics::histogram!(metric_defs::CHANNEL_PATH_LOSS.name, &labels).record(outcome.path_loss_db);
        if let Some(fading_loss_db) = outcome.fading_loss_db {
            metrics::histogram!(metric_defs::CHANNEL_FADING_LOSS.name, &labels).record(fading_loss_db);
        }
        if outcome.success {
            metrics::counter!(metric_defs::CHANNEL_RX_PACKETS.name, &labels).increment(1);
            metrics::histogram!(metric_defs::CHANNEL_RX_POWER.name, &labels).record(outcome.received_power_dbm);
        } else {
            metrics::counter!(metric_defs::CHANNEL_RX_LOST.name, &labels).increment(1);
        }
    }

    fn trace_topology(&self) {
        if !self.tracer.is_enabled() {
            return;
        }
        for gw in self.topology.gateways() {
            self.tracer
                .log(TraceEvent::topology(gw.name.as_str(), "Gateway").with_detail("position", gw.position.to_string()));
        }
        for d in self.topology.devices() {
            self.tracer.log(
                TraceEvent::topology(d.name.as_str(), "Device")
                    .with_detail("position", d.position.to_string())
                    .with_detail("gateway", d.gateway.as_str())
                    .with_detail("data_rate", d.data_rate.to_string())
                    .with_detail("tx_power_dbm", format!("{:.1}", d.tx_power_dbm)),
            );
        }
    }

    fn trace_outcome(&self, tx: &Transmission, outcome: &ChannelOutcome) {
        if !self.tracer.should_trace(tx.sender.as_str()) {
            return;
        }
        self.tracer.log(
            TraceEvent::transmit(tx.sender.as_str(), tx.timestamp)
                .with_detail("seq", tx.sequence.to_string())
                .with_detail("gateway", tx.receiver.as_str())
                .with_detail("tx_power_dbm", format!("{:.1}", tx.tx_power_dbm))
                .with_detail("payload_bytes", tx.payload_bytes.to_string()),
        );

        let event = if outcome.success {
            TraceEvent::delivered(tx.sender.as_str(), tx.timestamp)
                .with_detail("rx_power_dbm", format!("{:.2}", outcome.received_power_dbm))
        } else {
            TraceEvent::lost(tx.sender.as_str(), tx.timestamp)
        };
        let event = match outcome.fading_loss_db {
            Some(fading) => event.with_detail("fading_db", format!("{:.2}", fading)),
            None => event,
        };
        self.tracer.log(
            event
                .with_detail("seq", tx.sequence.to_string())
                .with_detail("distance_m", format!("{:.1}", outcome.distance_m))
                .with_detail("path_loss_db", format!("{:.2}", outcome.path_loss_db))
                .with_detail("snr_db", format!("{:.2}", outcome.snr_db)),
        );
    }
}
