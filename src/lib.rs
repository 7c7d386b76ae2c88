//! Parallel trade pricing pipeline.
//!
//! Trades flow from a single producer through a bounded work queue to a pool
//! of pricing workers, which record per-trade outcomes into a shared result
//! store. Failures of the pipeline itself are latched once and reported as a
//! partial run.

pub mod core;
pub mod engines;
pub mod pricer;
pub mod report;
pub mod sample;

pub use crate::core::{
    EngineRegistry, Error, FatalError, PriceOutcome, Priced, PricingEngine, PricingError, Result,
    ScalarResult, ScalarResults, Trade, TradeType,
};
pub use pricer::{ParallelPricer, PricerConfig, RunOutcome, RunStats, SerialPricer, NO_ENGINE_ERROR};
