use boid_core::{Flock, SimulationConfig, UpdateMode};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for population in [50usize, 200, 500] {
        for mode in [UpdateMode::Sequential, UpdateMode::Snapshot] {
            let config = SimulationConfig::default()
                .with_population(population)
                .with_update_mode(mode);
            let id = BenchmarkId::new(format!("{mode:?}"), population);

            group.bench_with_input(id, &config, |b, config| {
                let mut flock = Flock::with_seed(*config, 1).unwrap();
                b.iter(|| {
                    flock.tick();
                    black_box(flock.agents());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
