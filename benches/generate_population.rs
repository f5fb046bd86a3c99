use std::hint::black_box;
use std::path::PathBuf;

use criterion::{criterion_group, criterion_main, Criterion};
use outbreak_engine::infection::assign_infections;
use outbreak_engine::population::generate_population;
use outbreak_engine::seed::load_scenario;

static SEED: u64 = 123;

pub fn criterion_benchmark(c: &mut Criterion) {
    let scenario_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/lepto_rivergate");
    let (mut config, seed_data) = load_scenario(&scenario_dir).unwrap();

    c.bench_function("generate rivergate population", |bencher| {
        bencher.iter_with_large_drop(|| {
            generate_population(black_box(&seed_data), &config, SEED).unwrap()
        });
    });

    let population = generate_population(&seed_data, &config, SEED).unwrap();
    c.bench_function("assign rivergate infections", |bencher| {
        bencher.iter_with_large_drop(|| assign_infections(black_box(&population), &config).unwrap());
    });

    config.target_population = Some(5000);
    c.bench_function("generate 5000 residents", |bencher| {
        bencher.iter_with_large_drop(|| {
            generate_population(black_box(&seed_data), &config, SEED).unwrap()
        });
    });
}

criterion_group!(population_benches, criterion_benchmark);
criterion_main!(population_benches);
