//! Metrics declarations for the lorasim channel simulator.
//!
//! Re-exports the `metrics` facade and declares every metric the simulator
//! emits as a [`Metric`] constant, so names, units and labels live in one
//! place. Nothing is recorded unless the binary installs a recorder.
//!
//! # Example
//!
//! ```rust
//! use lorasim_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::new("dev0", "gw0", "thermal");
//! metrics::counter!(metric_defs::CHANNEL_TX_PACKETS.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use lorasim_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const LOST: Metric = Metric::counter("lorasim.channel.rx_lost")
///     .with_description("Transmissions below threshold")
///     .with_unit(Unit::Count)
///     .with_labels(&["node"]);
///
/// assert_eq!(LOST.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "lorasim.channel.tx_packets").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(self.name, unit, self.description),
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }

    /// Returns the unit as a human-readable string.
    pub fn unit_str(&self) -> &'static str {
        // dB quantities have no `Unit`; their descriptions carry it.
        self.unit.map_or("", |unit| unit.as_str())
    }
}

/// All metric definitions for the simulator.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every per-link metric.
    pub const LINK_LABELS: &[&str] = &["node", "gateway", "noise_source"];

    // ========================================================================
    // Channel Metrics
    // ========================================================================

    /// Transmissions handed to the channel.
    pub const CHANNEL_TX_PACKETS: Metric = Metric::counter("lorasim.channel.tx_packets")
        .with_description("Transmissions evaluated by the channel model")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Transmissions decoded by the gateway.
    pub const CHANNEL_RX_PACKETS: Metric = Metric::counter("lorasim.channel.rx_packets")
        .with_description("Transmissions decoded at the gateway")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Transmissions lost below the SNR threshold.
    pub const CHANNEL_RX_LOST: Metric = Metric::counter("lorasim.channel.rx_lost")
        .with_description("Transmissions lost below the SNR threshold")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// SNR of every evaluated transmission.
    pub const CHANNEL_RX_SNR: Metric = Metric::histogram("lorasim.channel.rx_snr_db")
        .with_description("Signal-to-noise ratio in dB of every evaluated transmission")
        .with_labels(LINK_LABELS);

    /// Received power of decoded transmissions.
    pub const CHANNEL_RX_POWER: Metric = Metric::histogram("lorasim.channel.rx_power_dbm")
        .with_description("Received power in dBm of decoded transmissions")
        .with_labels(LINK_LABELS);

    /// Deterministic path loss.
    pub const CHANNEL_PATH_LOSS: Metric = Metric::histogram("lorasim.channel.path_loss_db")
        .with_description("Log-distance path loss in dB")
        .with_labels(LINK_LABELS);

    /// Rayleigh fading loss (only when fading is enabled).
    pub const CHANNEL_FADING_LOSS: Metric = Metric::histogram("lorasim.channel.fading_loss_db")
        .with_description("Rayleigh fading loss in dB (negative values are gains)")
        .with_labels(LINK_LABELS);

    // ========================================================================
    // Delivery Metrics
    // ========================================================================

    /// Delivered over sent, in percent, at the end of a run.
    pub const DELIVERY_RATIO: Metric = Metric::gauge("lorasim.delivery.ratio_percent")
        .with_description("Delivered transmissions over sent transmissions")
        .with_unit(Unit::Percent);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &CHANNEL_TX_PACKETS,
        &CHANNEL_RX_PACKETS,
        &CHANNEL_RX_LOST,
        &CHANNEL_RX_SNR,
        &CHANNEL_RX_POWER,
        &CHANNEL_PATH_LOSS,
        &CHANNEL_FADING_LOSS,
        &DELIVERY_RATIO,
    ];
}

/// Labels identifying one device-to-gateway link.
///
/// ```rust
/// use lorasim_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("dev0", "gw0", "fixed_awgn");
/// let label_vec = labels.to_labels();
/// assert!(label_vec.iter().any(|(k, v)| *k == "gateway" && v == "gw0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLabels {
    /// Sending device.
    pub node: String,
    /// Receiving gateway.
    pub gateway: String,
    /// Noise source in effect.
    pub noise_source: String,
}

impl MetricLabels {
    /// Creates labels for a device, gateway and noise source.
    pub fn new(
        node: impl Into<String>,
        gateway: impl Into<String>,
        noise_source: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            gateway: gateway.into(),
            noise_source: noise_source.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("node", self.node.clone()),
            ("gateway", self.gateway.clone()),
            ("noise_source", self.noise_source.clone()),
        ]
    }
}

/// Describes all metrics used in the simulator.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
