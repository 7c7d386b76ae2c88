//! Synthetic trade book for demos and benchmarks.

use rand::Rng;
use time::{Date, Duration, Month};

use crate::core::{Result, Trade, TradeType};

const COUNTERPARTIES: [&str; 4] = ["BANK-A", "BANK-B", "FUND-C", "CORP-D"];

/// Two batches: bonds (gov, corp, supra) then fx (spot, forward), with
/// `per_type` trades of each type and ids like `GOV001` or `FWD002`.
pub fn sample_book(per_type: usize) -> Result<Vec<Vec<Trade>>> {
    let bonds = [
        (TradeType::GovBond, "GOV", "UKT 4.25 2032"),
        (TradeType::CorpBond, "CORP", "ACME 5.1 2029"),
        (TradeType::SupraBond, "SUPRA", "EIB 3.0 2030"),
    ];
    let fx = [
        (TradeType::FxSpot, "SPOT", "GBPUSD"),
        (TradeType::FxFwd, "FWD", "EURUSD"),
    ];
    Ok(vec![batch(&bonds, per_type)?, batch(&fx, per_type)?])
}

fn batch(kinds: &[(TradeType, &str, &str)], per_type: usize) -> Result<Vec<Trade>> {
    let mut rng = rand::thread_rng();
    let trade_date = base_date();
    let mut trades = Vec::with_capacity(kinds.len() * per_type);
    for (trade_type, prefix, instrument) in kinds {
        for n in 1..=per_type {
            let counterparty = COUNTERPARTIES[rng.gen_range(0..COUNTERPARTIES.len())];
            let mut trade = Trade::new(format!("{prefix}{n:03}"), *trade_type)?
                .with_trade_date(trade_date)
                .with_instrument(*instrument)
                .with_counterparty(counterparty)
                .with_notional(rng.gen_range(1..=100) as f64 * 100_000.0)
                .with_rate(rng.gen_range(0.5..6.0));
            if *trade_type == TradeType::FxFwd {
                trade = trade.with_value_date(trade_date + Duration::days(90));
            }
            trades.push(trade);
        }
    }
    Ok(trades)
}

fn base_date() -> Date {
    Date::from_calendar_date(2024, Month::January, 2).unwrap_or(Date::MIN)
}
