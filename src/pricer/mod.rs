//! Pricing drivers.
//!
//! [`ParallelPricer`] feeds trades through a bounded [`WorkQueue`] to a pool
//! of worker threads. [`SerialPricer`] prices on the calling thread and is the
//! single-threaded reference. Both record per-trade outcomes into a
//! [`ScalarResults`] and report pipeline failures through [`RunOutcome`].
//!
//! [`WorkQueue`]: crate::core::WorkQueue

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::latch::panic_message;
use crate::core::{EngineRegistry, Error, FatalError, Priced, Result, ScalarResults, Trade};

mod parallel;
mod serial;

pub use parallel::ParallelPricer;
pub use serial::SerialPricer;

/// Error recorded for trades whose type has no registered engine.
pub const NO_ENGINE_ERROR: &str = "No pricing engine available for this trade type";

const PROGRESS_INTERVAL: u64 = 100_000;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricerConfig {
    /// Number of worker threads. `0` uses the available parallelism.
    pub worker_count: usize,
    /// Queue capacity override. Defaults to twice the worker count.
    pub queue_capacity: Option<usize>,
}

impl PricerConfig {
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            queue_capacity: None,
        }
    }

    pub fn workers(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn capacity(&self, workers: usize) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| workers.saturating_mul(2))
            .max(1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeStatus {
    Priced,
    PricedWithWarning,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub trades_processed: u64,
    pub priced: u64,
    pub warnings: u64,
    pub failed: u64,
}

impl WorkerStats {
    fn record(&mut self, status: TradeStatus) {
        self.trades_processed += 1;
        match status {
            TradeStatus::Priced => self.priced += 1,
            TradeStatus::PricedWithWarning => {
                self.priced += 1;
                self.warnings += 1;
            }
            TradeStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunStats {
    pub trades_enqueued: u64,
    pub worker_stats: Vec<WorkerStats>,
    pub queue_capacity: usize,
    pub queue_high_water: usize,
    /// Message the work queue was closed with when input ended early.
    pub close_error: Option<String>,
    pub duration: Duration,
}

impl RunStats {
    pub fn trades_priced(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.trades_processed).sum()
    }

    pub fn trades_failed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.failed).sum()
    }

    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.trades_priced() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Result of a pricing run.
///
/// A run that is not complete still leaves every trade it managed to price in
/// the result store; [`RunOutcome::fatal_error`] names why it stopped.
#[derive(Debug)]
pub struct RunOutcome {
    fatal: Option<FatalError>,
    stats: RunStats,
}

impl RunOutcome {
    pub(crate) fn new(fatal: Option<FatalError>, stats: RunStats) -> Self {
        Self { fatal, stats }
    }

    pub fn completed_fully(&self) -> bool {
        self.fatal.is_none()
    }

    pub fn fatal_error(&self) -> Option<&FatalError> {
        self.fatal.as_ref()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// `Err(Error::Incomplete)` if the run hit a fatal error.
    pub fn into_result(self) -> Result<RunStats> {
        match self.fatal {
            None => Ok(self.stats),
            Some(fatal) => Err(Error::Incomplete(fatal.to_string())),
        }
    }
}

/// Price one trade and record its outcome.
///
/// Missing engines, engine errors, non-finite values and engine panics are
/// recorded against the trade. Only a failure of the store itself is
/// returned as an error.
pub(crate) fn price_trade(
    trade: &Trade,
    registry: &EngineRegistry,
    results: &ScalarResults,
) -> Result<TradeStatus> {
    let trade_id = trade.trade_id();
    let Some(engine) = registry.engine_for(trade.trade_type()) else {
        log::warn!("trade {trade_id}: no pricing engine for {}", trade.trade_type());
        record(results.add_error(trade_id, NO_ENGINE_ERROR))?;
        return Ok(TradeStatus::Failed);
    };

    log::debug!("started pricing trade {trade_id}");
    let priced = panic::catch_unwind(AssertUnwindSafe(|| engine.price(trade)));
    let failure = match priced {
        Ok(Ok(Priced { value, warning })) if value.is_finite() => {
            record(results.add_result(trade_id, value))?;
            let status = match warning {
                Some(warning) => {
                    log::warn!("trade {trade_id}: priced with warning: {warning}");
                    record(results.add_error(trade_id, warning))?;
                    TradeStatus::PricedWithWarning
                }
                None => TradeStatus::Priced,
            };
            log::debug!("completed pricing trade {trade_id}");
            return Ok(status);
        }
        Ok(Ok(priced)) => format!("pricing engine returned non-finite value {}", priced.value),
        Ok(Err(err)) => err.message().to_string(),
        Err(payload) => format!("pricing engine panicked: {}", panic_message(payload.as_ref())),
    };

    log::warn!("trade {trade_id}: pricing failed: {failure}");
    record(results.add_error(trade_id, failure))?;
    Ok(TradeStatus::Failed)
}

// Repeat writes for a trade id keep the first outcome and are not fatal.
fn record(outcome: Result<()>) -> Result<()> {
    match outcome {
        Err(Error::DuplicateResult(trade_id)) | Err(Error::DuplicateError(trade_id)) => {
            log::warn!("trade {trade_id}: outcome already recorded, keeping the first");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PricingError, TradeType};
    use std::sync::Arc;

    fn trade(id: &str, trade_type: TradeType) -> Trade {
        Trade::new(id, trade_type).unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = PricerConfig::default();
        assert!(config.workers() >= 1);
        assert_eq!(PricerConfig::with_workers(3).workers(), 3);
        assert_eq!(PricerConfig::with_workers(3).capacity(3), 6);
        let config = PricerConfig {
            worker_count: 2,
            queue_capacity: Some(0),
        };
        assert_eq!(config.capacity(2), 1);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: PricerConfig = serde_json::from_str(r#"{"worker_count": 4}"#).unwrap();
        assert_eq!(config, PricerConfig::with_workers(4));
        let config: PricerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PricerConfig::default());
    }

    #[test]
    fn missing_engine_records_error_only() {
        let registry = EngineRegistry::new();
        let results = ScalarResults::new();
        let status = price_trade(&trade("S1", TradeType::SupraBond), &registry, &results).unwrap();
        assert_eq!(status, TradeStatus::Failed);
        let entry = results.get("S1").unwrap();
        assert_eq!(entry.result, None);
        assert_eq!(entry.error.as_deref(), Some(NO_ENGINE_ERROR));
    }

    #[test]
    fn warning_is_recorded_beside_result() {
        let engine = |_: &Trade| -> std::result::Result<Priced, PricingError> {
            Ok(Priced::new(3.0).with_warning("calibration drift"))
        };
        let registry = EngineRegistry::new().with_engine(TradeType::FxFwd, Arc::new(engine));
        let results = ScalarResults::new();
        let status = price_trade(&trade("F1", TradeType::FxFwd), &registry, &results).unwrap();
        assert_eq!(status, TradeStatus::PricedWithWarning);
        let entry = results.get("F1").unwrap();
        assert_eq!(entry.result, Some(3.0));
        assert_eq!(entry.error.as_deref(), Some("calibration drift"));
    }

    #[test]
    fn non_finite_and_panics_become_trade_errors() {
        let nan = |_: &Trade| -> std::result::Result<Priced, PricingError> { Ok(Priced::new(f64::NAN)) };
        let boom = |_: &Trade| -> std::result::Result<Priced, PricingError> { panic!("curve missing") };
        let registry = EngineRegistry::new()
            .with_engine(TradeType::GovBond, Arc::new(nan))
            .with_engine(TradeType::CorpBond, Arc::new(boom));
        let results = ScalarResults::new();

        price_trade(&trade("G1", TradeType::GovBond), &registry, &results).unwrap();
        price_trade(&trade("C1", TradeType::CorpBond), &registry, &results).unwrap();

        let g1 = results.get("G1").unwrap();
        assert!(g1.is_failure());
        assert!(g1.error.unwrap().contains("non-finite"));
        let c1 = results.get("C1").unwrap();
        assert!(c1.is_failure());
        assert_eq!(c1.error.as_deref(), Some("pricing engine panicked: curve missing"));
    }

    #[test]
    fn duplicate_trade_id_keeps_first_outcome() {
        let engine = |trade: &Trade| -> std::result::Result<Priced, PricingError> {
            Ok(Priced::new(trade.notional()))
        };
        let registry = EngineRegistry::new().with_engine(TradeType::GovBond, Arc::new(engine));
        let results = ScalarResults::new();

        let first = trade("G1", TradeType::GovBond).with_notional(1.0);
        let second = trade("G1", TradeType::GovBond).with_notional(2.0);
        price_trade(&first, &registry, &results).unwrap();
        price_trade(&second, &registry, &results).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results.get("G1").unwrap().result, Some(1.0));
    }

    #[test]
    fn incomplete_outcome_converts_to_error() {
        let outcome = RunOutcome::new(
            Some(FatalError::WorkerPanicked {
                worker_id: 0,
                message: "boom".to_string(),
            }),
            RunStats::default(),
        );
        assert!(!outcome.completed_fully());
        assert!(matches!(outcome.into_result(), Err(Error::Incomplete(msg)) if msg.contains("boom")));
    }
}
