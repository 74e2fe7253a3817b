//! Whole-simulation benchmarks.
//!
//! Builds and runs the synthetic social scenario end to end under both
//! execution strategies.
#![expect(
    missing_docs,
    reason = "Criterion macros generate items without doc comments"
)]
#![expect(
    clippy::shadow_reuse,
    reason = "Criterion bench_with_input closures rebind parameter names"
)]
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use evograph_benches::{
    error::BenchSetupError, params::EngineBenchParams, scenario::social_scenario,
};
use evograph_core::{ExecutionStrategy, NoopObserver, ScenarioConfig, SimulationBuilder};

/// Seed used for all scenarios in this benchmark.
const SEED: u64 = 42;

/// Scenario sizes to benchmark.
const SIZES: &[EngineBenchParams] = &[
    EngineBenchParams {
        vertex_count: 500,
        iterations: 10,
    },
    EngineBenchParams {
        vertex_count: 5_000,
        iterations: 20,
    },
];

fn run_once(
    scenario: &ScenarioConfig,
    strategy: ExecutionStrategy,
) -> Result<usize, BenchSetupError> {
    let output = SimulationBuilder::new(scenario.clone())
        .with_observer(Arc::new(NoopObserver))
        .with_execution_strategy(strategy)
        .build()?
        .run()?;
    Ok(output.edges.iter().map(|edge| edge.edge_count()).sum())
}

fn simulation_run_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("simulation_run");
    group.sample_size(10);

    for params in SIZES {
        let scenario = social_scenario(params, SEED)?;
        for (label, strategy) in [
            ("sequential", ExecutionStrategy::Sequential),
            ("parallel", ExecutionStrategy::Parallel),
        ] {
            run_once(&scenario, strategy)?;
            group.bench_with_input(
                BenchmarkId::new(label, params),
                &scenario,
                |b, scenario| {
                    b.iter(|| run_once(scenario, strategy));
                },
            );
        }
    }

    group.finish();
    Ok(())
}

fn simulation_run(c: &mut Criterion) {
    if let Err(err) = simulation_run_impl(c) {
        panic!("simulation benchmark setup failed: {err}");
    }
}

criterion_group!(benches, simulation_run);
criterion_main!(benches);
