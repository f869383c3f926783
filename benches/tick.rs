//! Benchmarks for the tick engine.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use cellflow::compute::FluidEngine;
use cellflow::schema::{ScalarTriple, ScalarType, random_field};

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for size in [32, 64, 128] {
        let field = random_field(size, size, 7);

        group.bench_with_input(BenchmarkId::new("double", size), &field, |b, field| {
            let mut engine: FluidEngine<f64, f64, f64> = FluidEngine::from_field_str(
                field,
                ScalarTriple::splat(ScalarType::Double),
                1,
            )
            .expect("bench field is valid");
            b.iter(|| engine.tick());
        });

        group.bench_with_input(BenchmarkId::new("fixed32", size), &field, |b, field| {
            let triple = ScalarTriple::splat(ScalarType::Fixed { bits: 32, frac: 16 });
            let mut engine: FluidEngine<
                cellflow::numeric::Fixed32<16>,
                cellflow::numeric::Fixed32<16>,
                cellflow::numeric::Fixed32<16>,
            > = FluidEngine::from_field_str(field, triple, 1).expect("bench field is valid");
            b.iter(|| engine.tick());
        });
    }

    group.finish();
}

fn bench_tick_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_parallel");
    let field = random_field(128, 128, 7);

    for workers in [1, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                let mut engine: FluidEngine<f64, f64, f64> = FluidEngine::from_field_str(
                    &field,
                    ScalarTriple::splat(ScalarType::Double),
                    workers,
                )
                .expect("bench field is valid");
                b.iter(|| engine.tick());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_tick_parallel);
criterion_main!(benches);
