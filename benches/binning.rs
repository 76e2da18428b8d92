//! Sequential versus parallel binning, per combiner.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tabstream::binning::{BinBag, BinSpec, Combiner, Normalisation};
use tabstream::execution::{ExecutionEngine, ExecutionOptions};

fn make_samples(n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|i| {
            let x = (i as f64 * 0.618_033_988_7).fract() * 1_000.0;
            let w = 1.0 + (i % 13) as f64;
            (x, w)
        })
        .collect()
}

fn bench_sequential(c: &mut Criterion) {
    let samples = make_samples(1_000_000);
    let mut group = c.benchmark_group("bin_sequential");
    for combiner in [Combiner::Sum, Combiner::Mean, Combiner::Median] {
        let spec = BinSpec::linear(0.5).with_combiner(combiner);
        group.bench_with_input(BenchmarkId::from_parameter(combiner), &spec, |b, spec| {
            b.iter(|| {
                let mut bag = BinBag::new(*spec, 0.0).unwrap();
                for &(x, w) in &samples {
                    bag.submit(x, w);
                }
                black_box(bag.bin_iter(true, Normalisation::Unit).count())
            });
        });
    }
    group.finish();
}

fn bench_parallel(c: &mut Criterion) {
    let samples = make_samples(1_000_000);
    let engine = ExecutionEngine::new(ExecutionOptions::default()).unwrap();
    let mut group = c.benchmark_group("bin_parallel");
    for combiner in [Combiner::Sum, Combiner::Mean, Combiner::Median] {
        let spec = BinSpec::linear(0.5).with_combiner(combiner);
        group.bench_with_input(BenchmarkId::from_parameter(combiner), &spec, |b, spec| {
            b.iter(|| black_box(engine.bin_parallel(&samples, spec, 0.0).unwrap().bin_count()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sequential, bench_parallel);
criterion_main!(benches);
