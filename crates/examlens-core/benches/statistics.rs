use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examlens_core::consolidate::Consolidator;
use examlens_core::model::Sheet;
use examlens_core::ranking::RankingEngine;
use examlens_core::statistics::analyze;

fn scores(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i * 37) % 101) as f64).collect()
}

/// Distinct, mostly dissimilar names so no cluster absorbs the rest.
fn pseudo_name(i: usize) -> String {
    format!("{:x}", (i as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");

    let small = scores(30);
    let large = scores(10_000);

    group.bench_function("30_scores", |b| b.iter(|| analyze(black_box(&small))));
    group.bench_function("10000_scores", |b| b.iter(|| analyze(black_box(&large))));

    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let engine = RankingEngine::default();
    let large = scores(10_000);

    c.bench_function("rank_10000", |b| b.iter(|| engine.rank(black_box(&large), None)));
}

fn bench_consolidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidate");

    // clustering is quadratic in distinct names
    for n in [50usize, 200] {
        let sheets: Vec<Sheet> = ["Math", "Science", "History"]
            .iter()
            .map(|subject| {
                Sheet::from_pairs(
                    *subject,
                    (0..n).map(|i| (pseudo_name(i), (i % 100) as f64)),
                )
            })
            .collect();
        let consolidator = Consolidator::default().with_ambiguous_cluster_size(0);

        group.bench_function(format!("{n}_students"), |b| {
            b.iter(|| consolidator.consolidate(black_box(&sheets)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_analyze, bench_rank, bench_consolidate);
criterion_main!(benches);
