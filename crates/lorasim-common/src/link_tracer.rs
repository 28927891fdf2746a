//! Per-node trace logging for channel debugging.
//!
//! Tracing is opt-in and targets nodes by name. Each traced transmission
//! produces one human-readable line on stderr.
//!
//! ```rust,ignore
//! use lorasim_common::link_tracer::{LinkTracer, LinkTracerConfig, TraceEvent};
//!
//! let tracer = LinkTracer::new(LinkTracerConfig::from_spec("dev0,gw0"));
//! if tracer.should_trace("dev0") {
//!     tracer.log(TraceEvent::transmit("dev0", sim_time).with_detail("tx_power_dbm", "14.0"));
//! }
//! ```

use crate::SimTime;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Trace Event Types
// ============================================================================

/// Categories of trace events for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceCategory {
    /// A device handed a transmission to the channel.
    Transmit,
    /// The gateway decoded the transmission.
    Delivered,
    /// The transmission fell below the SNR threshold.
    Lost,
    /// Node placement.
    Topology,
}

impl fmt::Display for TraceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceCategory::Transmit => write!(f, "TX"),
            TraceCategory::Delivered => write!(f, "RX_OK"),
            TraceCategory::Lost => write!(f, "RX_LOST"),
            TraceCategory::Topology => write!(f, "TOPOLOGY"),
        }
    }
}

/// A trace event record.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    /// Name of the node the event belongs to.
    pub node: String,
    /// Simulation time when the event occurred.
    pub sim_time: SimTime,
    /// Category of the trace event.
    pub category: TraceCategory,
    /// Human-readable description of the event.
    pub description: String,
    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl TraceEvent {
    fn new(
        node: impl Into<String>,
        sim_time: SimTime,
        category: TraceCategory,
        description: impl Into<String>,
    ) -> Self {
        TraceEvent {
            node: node.into(),
            sim_time,
            category,
            description: description.into(),
            details: Vec::new(),
        }
    }

    /// A transmission leaving a device.
    pub fn transmit(node: impl Into<String>, sim_time: SimTime) -> Self {
        Self::new(node, sim_time, TraceCategory::Transmit, "Transmission")
    }

    /// A transmission decoded at a gateway.
    pub fn delivered(node: impl Into<String>, sim_time: SimTime) -> Self {
        Self::new(node, sim_time, TraceCategory::Delivered, "Delivered")
    }

    /// A transmission lost below threshold.
    pub fn lost(node: impl Into<String>, sim_time: SimTime) -> Self {
        Self::new(node, sim_time, TraceCategory::Lost, "Lost")
    }

    /// A node placement record.
    pub fn topology(node: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(node, SimTime::ZERO, TraceCategory::Topology, description)
    }

    /// Add a detail to this event.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[TRACE] {} @ {:.3}s: {} {}",
            self.node,
            self.sim_time.as_secs_f64(),
            self.category,
            self.description
        )?;
        if !self.details.is_empty() {
            let parts: Vec<String> = self
                .details
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " [{}]", parts.join(", "))?;
        }
        Ok(())
    }
}

// ============================================================================
// Tracer Configuration
// ============================================================================

/// Configuration for link tracing.
#[derive(Debug, Clone, Default)]
pub struct LinkTracerConfig {
    /// Node names to trace. Empty means no tracing; `"*"` traces everything.
    pub traced_names: HashSet<String>,
    /// Categories to trace. If empty, all categories are traced.
    pub traced_categories: HashSet<TraceCategory>,
}

impl LinkTracerConfig {
    /// Create a new empty config (no tracing).
    pub fn none() -> Self {
        Self::default()
    }

    /// Create a tracer config from a comma-separated list of node names.
    ///
    /// `"*"` traces all nodes.
    pub fn from_spec(spec: &str) -> Self {
        let traced_names = spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();

        LinkTracerConfig {
            traced_names,
            traced_categories: HashSet::new(),
        }
    }

    /// Check if tracing is enabled at all.
    pub fn is_enabled(&self) -> bool {
        !self.traced_names.is_empty()
    }

    /// Check if all nodes should be traced.
    pub fn traces_all(&self) -> bool {
        self.traced_names.contains("*")
    }

    /// Check if a specific node should be traced.
    pub fn should_trace(&self, name: &str) -> bool {
        self.is_enabled() && (self.traces_all() || self.traced_names.contains(name))
    }

    /// Check if a category should be traced.
    pub fn should_trace_category(&self, category: TraceCategory) -> bool {
        self.traced_categories.is_empty() || self.traced_categories.contains(&category)
    }

    /// Add a category filter.
    pub fn with_category(mut self, category: TraceCategory) -> Self {
        self.traced_categories.insert(category);
        self
    }
}

// ============================================================================
// Link Tracer
// ============================================================================

/// Shared, cheaply cloneable tracer.
#[derive(Clone, Default)]
pub struct LinkTracer {
    config: Arc<LinkTracerConfig>,
}

impl LinkTracer {
    /// Create a new tracer with the given configuration.
    pub fn new(config: LinkTracerConfig) -> Self {
        LinkTracer {
            config: Arc::new(config),
        }
    }

    /// Create a tracer that does no tracing.
    pub fn disabled() -> Self {
        LinkTracer::new(LinkTracerConfig::none())
    }

    /// Check if tracing is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Check if a specific node should be traced.
    pub fn should_trace(&self, name: &str) -> bool {
        self.config.should_trace(name)
    }

    /// Get the tracer configuration.
    pub fn config(&self) -> &LinkTracerConfig {
        &self.config
    }

    /// Whether an event passes the node and category filters.
    pub fn accepts(&self, event: &TraceEvent) -> bool {
        self.config.should_trace(&event.node) && self.config.should_trace_category(event.category)
    }

    /// Log a trace event.
    pub fn log(&self, event: TraceEvent) {
        if self.accepts(&event) {
            eprintln!("{}", event);
        }
    }
}

impl fmt::Debug for LinkTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkTracer")
            .field("enabled", &self.is_enabled())
            .field("traces_all", &self.config.traces_all())
            .finish()
    }
}
