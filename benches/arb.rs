use chrono::{DateTime, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hopper::arb::detector::CycleDetector;
use hopper::arb::graph::Graph;
use hopper::arb::pool::Pool;
use hopper::arb::quote::{Quote, QuoteBoard};
use rand::prelude::*;
use std::collections::BTreeSet;

/// Generate synthetic pools and a matching quote board for benchmarking.
///
/// Symbols are priced around 1.0 and reserves are drawn so that most pools
/// sit near parity with a few percent of imbalance, which yields a realistic
/// scattering of profitable cycles.
fn generate_market(
    pool_count: usize,
    symbol_count: usize,
) -> (Vec<Pool>, QuoteBoard, DateTime<Utc>) {
    let mut rng = rand::rng();
    let now = Utc::now();

    let symbols: Vec<String> = (0..symbol_count).map(|i| format!("TK{i}")).collect();

    let mut board = QuoteBoard::new(chrono::Duration::seconds(300));
    for symbol in &symbols {
        let price = rng.random_range(0.5..2.0);
        board.insert(Quote::new(symbol.as_str(), price, now, "bench").unwrap());
    }

    let mut pools = Vec::with_capacity(pool_count);
    for i in 0..pool_count {
        let idx1 = rng.random_range(0..symbol_count);
        let mut idx2 = rng.random_range(0..symbol_count);
        while idx1 == idx2 {
            idx2 = rng.random_range(0..symbol_count);
        }

        let base_reserve = rng.random_range(10_000.0..1_000_000.0);
        // Up to ±5% off parity, enough to seed negative cycles.
        let skew = rng.random_range(0.95..1.05);
        let counter_reserve = base_reserve * skew;

        pools.push(
            Pool::new(
                format!("P{i}"),
                "ethereum",
                symbols[idx1].as_str(),
                symbols[idx2].as_str(),
                base_reserve,
                counter_reserve,
                0.003,
            )
            .unwrap(),
        );
    }

    (pools, board, now)
}

/// Benchmark building the liquidity graph from a pool snapshot.
fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    group.sample_size(20);

    for pool_count in [100, 500, 1000] {
        let symbol_count = (pool_count / 5).max(10);
        let (pools, board, now) = generate_market(pool_count, symbol_count);

        group.throughput(criterion::Throughput::Elements(pool_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(pool_count),
            &pool_count,
            |b, _| {
                b.iter(|| black_box(Graph::build(&pools, &board, now)));
            },
        );
    }

    group.finish();
}

/// Benchmark the full detection pass: build, bridge, search, rank.
fn bench_find_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_profitable_cycles");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    for pool_count in [100, 500, 1000] {
        let symbol_count = (pool_count / 5).max(10);
        let (pools, board, now) = generate_market(pool_count, symbol_count);
        let graph = Graph::build(&pools, &board, now);
        let detector = CycleDetector::new(5, 1_000.0);

        group.throughput(criterion::Throughput::Elements(pool_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(pool_count),
            &pool_count,
            |b, _| {
                b.iter(|| {
                    black_box(detector.find_profitable_cycles(
                        &graph,
                        &board,
                        now,
                        &BTreeSet::new(),
                    ))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_graph_build, bench_find_cycles);
criterion_main!(benches);
