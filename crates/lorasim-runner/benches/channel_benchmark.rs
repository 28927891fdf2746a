//! Throughput benchmarks for channel evaluation.
//!
//! ## Running the benchmarks
//!
//! ```bash
//! cargo bench -p lorasim-runner
//! ```
//!
//! ## Benchmarks included
//!
//! - `evaluate_link` - single evaluations with and without fading
//! - `run_N_devices` - full runs with shared, per-device and parallel streams

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lorasim_channel::{ChannelEvaluator, ChannelParameters, EvaluationOptions, NoiseSource};
use lorasim_model::{GatewayConfig, Model, PlacementConfig, RngStreams, UniformDiscConfig};
use lorasim_common::Position;
use lorasim_runner::SimulationRunner;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn bench_evaluate_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_link");
    group.throughput(Throughput::Elements(1));

    for fading in [false, true] {
        let evaluator = ChannelEvaluator::new(
            ChannelParameters::default(),
            EvaluationOptions::new(NoiseSource::Thermal, fading),
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let label = if fading { "fading" } else { "static" };

        group.bench_function(label, |b| {
            b.iter(|| evaluator.evaluate_link(black_box(14.0), black_box(850.0), &mut rng))
        });
    }

    group.finish();
}

fn disc_model(count: usize, streams: RngStreams, parallel: bool) -> Model {
    let mut model = Model {
        gateways: vec![GatewayConfig {
            name: "gw0".to_string(),
            position: Position::new(0.0, 0.0, 15.0),
        }],
        placement: PlacementConfig {
            uniform_disc: Some(UniformDiscConfig {
                count,
                ..Default::default()
            }),
        },
        ..Default::default()
    };
    model.evaluation.fading = true;
    model.evaluation.rng_streams = streams;
    model.evaluation.parallel = parallel;
    model.traffic.period_s = 60.0;
    model
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    group.sample_size(20);

    for device_count in [16usize, 128, 512] {
        let modes = [
            ("shared", RngStreams::Shared, false),
            ("per_device", RngStreams::PerDevice, false),
            ("parallel", RngStreams::PerDevice, true),
        ];
        for (mode, streams, parallel) in modes {
            let runner = SimulationRunner::new(disc_model(device_count, streams, parallel)).unwrap();
            group.throughput(Throughput::Elements(runner.schedule().len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("run_{}_devices", device_count), mode),
                &runner,
                |b, runner| b.iter(|| runner.run().unwrap()),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate_link, bench_run);
criterion_main!(benches);
