//! # lorasim
//!
//! Command-line entry point for the lorasim LoRa channel simulator.

use clap::{Parser, Subcommand, ValueEnum};
use lorasim_channel::{compute_noise_floor_dbm, ChannelEvaluator, ChannelParameters, NoiseSource};
use lorasim_common::link_tracer::{LinkTracer, LinkTracerConfig};
use lorasim_model::{load_model, Model};
use lorasim_runner::metrics_export::{self, InMemoryRecorder};
use lorasim_runner::{probe_link, RunnerError, SimulationRunner};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// CLI Configuration
// ============================================================================

/// Output format for command results.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Human-readable summary.
    Text,
}

/// Output format for metrics collected during a run.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MetricsOutputFormat {
    /// JSON with totals and a per-node breakdown.
    Json,
    /// Prometheus text exposition format.
    Prometheus,
}

/// lorasim - LoRa uplink channel simulator
#[derive(Parser, Debug)]
#[command(name = "lorasim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario and report delivery statistics
    Run(RunConfig),
    /// Evaluate a single device-to-gateway link
    Link(LinkConfig),
    /// Compute the thermal noise floor of a receiver
    NoiseFloor(NoiseFloorConfig),
    /// List all available metrics with descriptions and labels
    Metrics,
}

/// Overrides shared by commands that evaluate the channel.
#[derive(Parser, Debug)]
pub struct ChannelOverrides {
    /// Override the scenario seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Override the noise source (thermal or fixed_awgn)
    #[arg(long, value_name = "SOURCE")]
    pub noise_source: Option<NoiseSource>,

    /// Enable Rayleigh fading
    #[arg(long, conflicts_with = "no_fading")]
    pub fading: bool,

    /// Disable Rayleigh fading
    #[arg(long)]
    pub no_fading: bool,
}

impl ChannelOverrides {
    fn apply(&self, model: &mut Model) {
        if let Some(seed) = self.seed {
            model.simulation.seed = seed;
        }
        if let Some(source) = self.noise_source {
            model.evaluation.noise_source = source;
        }
        if self.fading {
            model.evaluation.fading = true;
        }
        if self.no_fading {
            model.evaluation.fading = false;
        }
    }
}

#[derive(Parser, Debug)]
pub struct RunConfig {
    /// Scenario YAML file
    #[arg(required_unless_present = "reference", conflicts_with = "reference")]
    pub scenario: Option<PathBuf>,

    /// Run the built-in three-device reference scenario
    #[arg(long)]
    pub reference: bool,

    #[command(flatten)]
    pub overrides: ChannelOverrides,

    /// Evaluate devices in parallel (requires per-device random streams)
    #[arg(long)]
    pub parallel: bool,

    /// Trace nodes (comma-separated names, or "*" for all)
    #[arg(long, value_name = "NODES")]
    pub trace: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Collect metrics during the run and export them in this format
    #[arg(long, value_enum)]
    pub metrics_output: Option<MetricsOutputFormat>,

    /// Write exported metrics to a file instead of stdout
    #[arg(long, value_name = "FILE", requires = "metrics_output")]
    pub metrics_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(allow_negative_numbers = true)]
pub struct LinkConfig {
    /// Scenario whose channel configuration is used (defaults otherwise)
    #[arg(short, long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Device to gateway distance in meters
    #[arg(long)]
    pub distance: f64,

    /// Transmit power in dBm
    #[arg(long, default_value = "14.0")]
    pub tx_power: f64,

    /// Number of evaluations (useful with fading)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub samples: u32,

    #[command(flatten)]
    pub overrides: ChannelOverrides,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
#[command(allow_negative_numbers = true)]
pub struct NoiseFloorConfig {
    /// Receiver temperature in degrees Celsius
    #[arg(long, default_value = "25.0")]
    pub temperature: f64,

    /// Receiver bandwidth in Hz
    #[arg(long, default_value = "125000")]
    pub bandwidth: f64,

    /// Receiver noise figure in dB
    #[arg(long, default_value = "3.0")]
    pub noise_figure: f64,
}

// ============================================================================
// Commands
// ============================================================================

fn run_command(config: RunConfig) -> Result<(), RunnerError> {
    let mut model = match &config.scenario {
        Some(path) => load_model(path)?,
        None => Model::reference_scenario(),
    };
    config.overrides.apply(&mut model);
    if config.parallel {
        model.evaluation.parallel = true;
    }

    let tracer = config
        .trace
        .as_deref()
        .map(|spec| LinkTracer::new(LinkTracerConfig::from_spec(spec)))
        .unwrap_or_default();

    let recorder = match config.metrics_output {
        Some(_) => install_recorder(),
        None => None,
    };

    let runner = SimulationRunner::new(model)?.with_tracer(tracer);
    let report = runner.run()?;

    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report),
    }

    if let (Some(format), Some(recorder)) = (config.metrics_output, recorder) {
        let mut writer: Box<dyn Write> = match &config.metrics_file {
            Some(path) => Box::new(std::fs::File::create(path)?),
            None => Box::new(std::io::stdout()),
        };
        let snapshot = recorder.snapshot();
        match format {
            MetricsOutputFormat::Json => metrics_export::export_json(&snapshot, &mut writer)?,
            MetricsOutputFormat::Prometheus => metrics_export::export_prometheus(&snapshot, &mut writer)?,
        }
        if let Some(path) = &config.metrics_file {
            info!(path = %path.display(), "Metrics exported");
        }
    }
    Ok(())
}

/// Install an in-memory recorder as the global metrics recorder.
fn install_recorder() -> Option<InMemoryRecorder> {
    let recorder = InMemoryRecorder::new();
    match metrics::set_global_recorder(recorder.clone()) {
        Ok(()) => {
            lorasim_metrics::describe_metrics();
            Some(recorder)
        }
        Err(e) => {
            warn!("Failed to set metrics recorder: {}", e);
            None
        }
    }
}

fn link_command(config: LinkConfig) -> Result<(), RunnerError> {
    let mut model = match &config.config {
        Some(path) => load_model(path)?,
        None => Model::default(),
    };
    config.overrides.apply(&mut model);

    let evaluator = ChannelEvaluator::new(model.channel, model.evaluation.options())?;
    info!(distance_m = config.distance, tx_power_dbm = config.tx_power, "Probing link");
    let probe = probe_link(
        &evaluator,
        config.tx_power,
        config.distance,
        config.samples,
        model.simulation.seed,
    )?;

    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&probe)?),
        OutputFormat::Text => {
            println!("Distance:       {:.1} m", probe.distance_m);
            println!("TX power:       {:.1} dBm", probe.tx_power_dbm);
            println!("Path loss:      {:.2} dB", probe.path_loss_db);
            println!(
                "Noise floor:    {:.2} dBm ({})",
                probe.noise_floor_dbm,
                evaluator.noise_source()
            );
            println!("SNR threshold:  {:.1} dB", probe.snr_threshold_db);
            if let (Some(min), Some(mean), Some(max)) = (probe.snr.min_db, probe.snr.mean_db, probe.snr.max_db) {
                println!("SNR:            {:.2} dB (min {:.2}, max {:.2})", mean, min, max);
            }
            println!(
                "Delivered:      {}/{} ({:.1}%)",
                probe.delivery.delivered,
                probe.delivery.sent,
                probe.success_fraction * 100.0
            );
        }
    }
    Ok(())
}

fn noise_floor_command(config: NoiseFloorConfig) -> Result<(), RunnerError> {
    let params = ChannelParameters {
        temperature_c: config.temperature,
        bandwidth_hz: config.bandwidth,
        noise_figure_db: config.noise_figure,
        ..Default::default()
    };
    params.validate()?;

    let floor = compute_noise_floor_dbm(params.temperature_c, params.bandwidth_hz, params.noise_figure_db);
    println!(
        "Noise floor: {:.3} dBm (T = {:.2} °C, B = {:.0} Hz, NF = {:.1} dB)",
        floor, params.temperature_c, params.bandwidth_hz, params.noise_figure_db
    );
    Ok(())
}

/// Print information about all available metrics
fn print_metrics_info() {
    use lorasim_metrics::metric_defs;

    println!("lorasim Available Metrics");
    println!("=========================\n");

    println!("Per-link metrics carry the following labels:");
    println!("  - node: Sending device");
    println!("  - gateway: Receiving gateway");
    println!("  - noise_source: thermal or fixed_awgn");
    println!();

    let categories = [("Channel", "lorasim.channel."), ("Delivery", "lorasim.delivery.")];

    for (category_name, prefix) in categories {
        println!("## {}\n", category_name);

        for metric in metric_defs::ALL.iter().filter(|m| m.name.starts_with(prefix)) {
            println!("  {}", metric.name);
            println!("    Type: {}", metric.kind);
            let unit_str = metric.unit_str();
            if !unit_str.is_empty() {
                println!("    Unit: {}", unit_str);
            }
            if !metric.description.is_empty() {
                println!("    Description: {}", metric.description);
            }
            if !metric.labels.is_empty() {
                println!("    Labels: {}", metric.labels.join(", "));
            }
            println!();
        }
    }
}

fn main() -> Result<(), RunnerError> {
    // Default to "warn" when RUST_LOG is not set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(config) => run_command(config)?,
        Commands::Link(config) => link_command(config)?,
        Commands::NoiseFloor(config) => noise_floor_command(config)?,
        Commands::Metrics => print_metrics_info(),
    }

    Ok(())
}
