//! In-memory metrics recorder and end-of-run export.
//!
//! [`InMemoryRecorder`] implements [`metrics::Recorder`], so every
//! `counter!`, `gauge!` and `histogram!` emitted during a run lands in it.
//! A [`MetricsSnapshot`] aggregates the values per metric name, with a
//! per-node breakdown taken from the `node` label, and can be written as
//! JSON or in the Prometheus text format.

use chrono::{DateTime, Utc};
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// Snapshot Types
// ============================================================================

/// Summary statistics for a histogram metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Metric values for one node.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct NodeMetrics {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub gauges: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Metric values collected by the recorder.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Totals across all label sets.
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
    /// Breakdown by the `node` label.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeMetrics>,
}

impl MetricsSnapshot {
    /// Counter total, zero if the counter was never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Counter value for one node, zero if absent.
    pub fn node_counter(&self, node: &str, name: &str) -> u64 {
        self.nodes
            .get(node)
            .and_then(|n| n.counters.get(name))
            .copied()
            .unwrap_or(0)
    }
}

// ============================================================================
// Export Functions
// ============================================================================

/// Export metrics as JSON.
pub fn export_json<W: Write>(snapshot: &MetricsSnapshot, writer: &mut W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, snapshot)?;
    writeln!(writer)?;
    Ok(())
}

/// Export metrics in the Prometheus text exposition format.
pub fn export_prometheus<W: Write>(snapshot: &MetricsSnapshot, writer: &mut W) -> std::io::Result<()> {
    for (name, value) in &snapshot.counters {
        let prom_name = name.replace('.', "_");
        writeln!(writer, "# TYPE {} counter", prom_name)?;
        writeln!(writer, "{} {}", prom_name, value)?;
        for (node, metrics) in &snapshot.nodes {
            if let Some(value) = metrics.counters.get(name) {
                writeln!(writer, "{}{{node=\"{}\"}} {}", prom_name, node, value)?;
            }
        }
    }

    for (name, value) in &snapshot.gauges {
        let prom_name = name.replace('.', "_");
        writeln!(writer, "# TYPE {} gauge", prom_name)?;
        writeln!(writer, "{} {}", prom_name, value)?;
    }

    for (name, summary) in &snapshot.histograms {
        let prom_name = name.replace('.', "_");
        writeln!(writer, "# TYPE {} summary", prom_name)?;
        writeln!(writer, "{}_count {}", prom_name, summary.count)?;
        writeln!(writer, "{}_sum {}", prom_name, summary.sum)?;
        for (node, metrics) in &snapshot.nodes {
            if let Some(s) = metrics.histograms.get(name) {
                writeln!(writer, "{}_count{{node=\"{}\"}} {}", prom_name, node, s.count)?;
                writeln!(writer, "{}_sum{{node=\"{}\"}} {}", prom_name, node, s.sum)?;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Recorder State
// ============================================================================

#[derive(Debug, Default)]
struct CounterState {
    value: AtomicU64,
}

/// f64 stored as bits.
#[derive(Debug, Default)]
struct GaugeState {
    value: AtomicU64,
}

impl GaugeState {
    fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }

    fn update(&self, f: impl Fn(f64) -> f64) {
        let mut current = self.value.load(Ordering::Relaxed);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self
                .value
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HistogramAccumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for HistogramAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl HistogramAccumulator {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn merge(&mut self, other: &HistogramAccumulator) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    fn summary(&self) -> HistogramSummary {
        if self.count == 0 {
            return HistogramSummary {
                count: 0,
                sum: 0.0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        HistogramSummary {
            count: self.count,
            sum: self.sum,
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
        }
    }
}

#[derive(Debug, Default)]
struct HistogramState {
    acc: Mutex<HistogramAccumulator>,
}

#[derive(Debug, Default)]
struct RecorderState {
    counters: RwLock<HashMap<Key, Arc<CounterState>>>,
    gauges: RwLock<HashMap<Key, Arc<GaugeState>>>,
    histograms: RwLock<HashMap<Key, Arc<HistogramState>>>,
}

fn get_or_create<T: Default>(map: &RwLock<HashMap<Key, Arc<T>>>, key: &Key) -> Arc<T> {
    if let Some(state) = map.read().get(key) {
        return Arc::clone(state);
    }
    Arc::clone(map.write().entry(key.clone()).or_default())
}

fn node_label(key: &Key) -> Option<String> {
    key.labels()
        .find(|label| label.key() == "node")
        .map(|label| label.value().to_string())
}

impl RecorderState {
    fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot {
            timestamp: Utc::now(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            histograms: BTreeMap::new(),
            nodes: BTreeMap::new(),
        };

        for (key, state) in self.counters.read().iter() {
            let name = key.name().to_string();
            let value = state.value.load(Ordering::Relaxed);
            *snapshot.counters.entry(name.clone()).or_default() += value;
            if let Some(node) = node_label(key) {
                *snapshot.nodes.entry(node).or_default().counters.entry(name).or_default() += value;
            }
        }

        for (key, state) in self.gauges.read().iter() {
            let name = key.name().to_string();
            let value = state.get();
            *snapshot.gauges.entry(name.clone()).or_default() += value;
            if let Some(node) = node_label(key) {
                *snapshot.nodes.entry(node).or_default().gauges.entry(name).or_default() += value;
            }
        }

        let mut totals: BTreeMap<String, HistogramAccumulator> = BTreeMap::new();
        let mut per_node: BTreeMap<(String, String), HistogramAccumulator> = BTreeMap::new();
        for (key, state) in self.histograms.read().iter() {
            let name = key.name().to_string();
            let acc = *state.acc.lock();
            totals.entry(name.clone()).or_default().merge(&acc);
            if let Some(node) = node_label(key) {
                per_node.entry((node, name)).or_default().merge(&acc);
            }
        }
        snapshot.histograms = totals.into_iter().map(|(name, acc)| (name, acc.summary())).collect();
        for ((node, name), acc) in per_node {
            snapshot.nodes.entry(node).or_default().histograms.insert(name, acc.summary());
        }

        snapshot
    }
}

// ============================================================================
// In-Memory Recorder
// ============================================================================

/// Recorder that keeps every metric in memory for export at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecorder {
    state: Arc<RecorderState>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of all current metric values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.snapshot()
    }
}

struct InMemoryCounter(Arc<CounterState>);

impl metrics::CounterFn for InMemoryCounter {
    fn increment(&self, value: u64) {
        self.0.value.fetch_add(value, Ordering::Relaxed);
    }

    fn absolute(&self, value: u64) {
        self.0.value.fetch_max(value, Ordering::Relaxed);
    }
}

struct InMemoryGauge(Arc<GaugeState>);

impl metrics::GaugeFn for InMemoryGauge {
    fn increment(&self, value: f64) {
        self.0.update(|v| v + value);
    }

    fn decrement(&self, value: f64) {
        self.0.update(|v| v - value);
    }

    fn set(&self, value: f64) {
        self.0.value.store(value.to_bits(), Ordering::Relaxed);
    }
}

struct InMemoryHistogram(Arc<HistogramState>);

impl metrics::HistogramFn for InMemoryHistogram {
    fn record(&self, value: f64) {
        self.0.acc.lock().record(value);
    }
}

impl Recorder for InMemoryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(InMemoryCounter(get_or_create(&self.state.counters, key))))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(InMemoryGauge(get_or_create(&self.state.gauges, key))))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(InMemoryHistogram(get_or_create(&self.state.histograms, key))))
    }
}
