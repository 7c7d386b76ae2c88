use std::sync::Arc;

use riskflow::{
    EngineRegistry, ParallelPricer, Priced, PricingError, ScalarResult, ScalarResults,
    SerialPricer, Trade, TradeType,
};

fn deterministic(trade: &Trade) -> Result<Priced, PricingError> {
    let n: u64 = trade.trade_id()[1..].parse().map_err(|_| PricingError::new("bad id"))?;
    if n % 7 == 0 {
        return Err(PricingError::new(format!("model failed for {}", trade.trade_id())));
    }
    let priced = Priced::new(trade.notional() * trade.rate());
    if n % 11 == 0 {
        return Ok(priced.with_warning("stale curve"));
    }
    Ok(priced)
}

fn registry() -> EngineRegistry {
    EngineRegistry::new()
        .with_engine(TradeType::GovBond, Arc::new(deterministic))
        .with_engine(TradeType::CorpBond, Arc::new(deterministic))
        .with_engine(TradeType::FxSpot, Arc::new(deterministic))
}

fn book() -> Vec<Vec<Trade>> {
    let types = [
        TradeType::GovBond,
        TradeType::CorpBond,
        TradeType::SupraBond,
        TradeType::FxSpot,
    ];
    (0..5)
        .map(|b| {
            (0..100)
                .map(|i| {
                    let n = b * 100 + i;
                    Trade::new(format!("T{n}"), types[n % types.len()])
                        .expect("trade")
                        .with_notional(1_000.0 + n as f64)
                        .with_rate(0.01 * (n % 9) as f64)
                })
                .collect()
        })
        .collect()
}

fn sorted(results: ScalarResults) -> Vec<ScalarResult> {
    let mut entries: Vec<_> = results.into_iter().collect();
    entries.sort_by(|a, b| a.trade_id.cmp(&b.trade_id));
    entries
}

#[test]
fn parallel_matches_serial_reference() {
    let serial = ScalarResults::new();
    assert!(SerialPricer::new()
        .price(book(), &serial, &registry())
        .completed_fully());

    let parallel = ScalarResults::new();
    let outcome = ParallelPricer::new(8).price(book(), &parallel, &registry());
    assert!(outcome.completed_fully());
    assert_eq!(outcome.stats().trades_priced(), 500);

    let serial = sorted(serial);
    let parallel = sorted(parallel);
    assert_eq!(serial.len(), 500);
    assert_eq!(serial, parallel);
    assert!(serial.iter().any(|entry| entry.has_warning()));
    assert!(serial
        .iter()
        .any(|entry| entry.error.as_deref() == Some(riskflow::NO_ENGINE_ERROR)));
}

#[test]
fn rerun_with_fresh_state_is_identical() {
    let first = ScalarResults::new();
    ParallelPricer::new(3).price(book(), &first, &registry());
    let second = ScalarResults::new();
    ParallelPricer::new(6).price(book(), &second, &registry());

    assert_eq!(sorted(first), sorted(second));
}
