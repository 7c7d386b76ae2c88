use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use riskflow::{
    EngineRegistry, ParallelPricer, Priced, PricingError, ScalarResults, Trade, TradeType,
};

const TRADES: usize = 10_000;

fn book() -> Vec<Vec<Trade>> {
    (0..10)
        .map(|b| {
            (0..TRADES / 10)
                .map(|n| {
                    Trade::new(format!("GOV{b}-{n}"), TradeType::GovBond)
                        .expect("trade")
                        .with_notional(n as f64)
                })
                .collect()
        })
        .collect()
}

fn bench_parallel_price(c: &mut Criterion) {
    let engine = |trade: &Trade| -> Result<Priced, PricingError> {
        Ok(Priced::new(black_box(trade.notional() * 1.01)))
    };
    let registry = EngineRegistry::new().with_engine(TradeType::GovBond, Arc::new(engine));

    let mut group = c.benchmark_group("parallel_price");
    group.throughput(Throughput::Elements(TRADES as u64));
    for workers in [1, 2, 4, 8] {
        group.bench_function(format!("{workers}_workers"), |b| {
            b.iter_batched(
                book,
                |batches| {
                    let results = ScalarResults::new();
                    let outcome = ParallelPricer::new(workers).price(batches, &results, &registry);
                    assert!(outcome.completed_fully());
                    results
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parallel_price);
criterion_main!(benches);
