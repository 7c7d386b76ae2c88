//! Simulated pricing engines.
//!
//! Each engine sleeps for a configurable latency and returns a random value
//! in `[0, 100)`. Selected trade ids can be forced to fail or to succeed with
//! a warning.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::core::{EngineRegistry, Priced, PricingEngine, PricingError, Trade, TradeType};

pub const UNSUPPORTED_TRADE_TYPE: &str = "Trade type not supported";

const GOV_BOND_LATENCY: Duration = Duration::from_millis(5_000);
const CORP_BOND_LATENCY: Duration = Duration::from_millis(8_000);
const FX_LATENCY: Duration = Duration::from_millis(2_000);

#[derive(Clone, Debug)]
pub struct SimulatedEngine {
    name: &'static str,
    supported: HashSet<TradeType>,
    latency: Duration,
    failures: HashMap<String, String>,
    warnings: HashMap<String, String>,
}

impl SimulatedEngine {
    pub fn new(name: &'static str, supported: &[TradeType], latency: Duration) -> Self {
        Self {
            name,
            supported: supported.iter().copied().collect(),
            latency,
            failures: HashMap::new(),
            warnings: HashMap::new(),
        }
    }

    pub fn gov_bond() -> Self {
        Self::new("gov-bond", &[TradeType::GovBond], GOV_BOND_LATENCY).with_default_scenarios()
    }

    pub fn corp_bond() -> Self {
        Self::new("corp-bond", &[TradeType::CorpBond], CORP_BOND_LATENCY).with_default_scenarios()
    }

    pub fn fx() -> Self {
        Self::new("fx", &[TradeType::FxSpot, TradeType::FxFwd], FX_LATENCY)
            .with_default_scenarios()
    }

    fn with_default_scenarios(self) -> Self {
        self.with_failure("GOV006", "Undefined error in pricing")
            .with_warning("FWD001", "Unable to calibrate model to value date")
    }

    /// Always fail `trade_id` with `message`.
    pub fn with_failure(mut self, trade_id: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(trade_id.into(), message.into());
        self
    }

    /// Price `trade_id` but attach `message` as a warning.
    pub fn with_warning(mut self, trade_id: impl Into<String>, message: impl Into<String>) -> Self {
        self.warnings.insert(trade_id.into(), message.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Multiply the latency by `factor`. Negative or non-finite factors yield
    /// zero; products past [`Duration::MAX`] saturate.
    pub fn scale_latency(self, factor: f64) -> Self {
        let latency = if factor.is_finite() && factor > 0.0 {
            Duration::try_from_secs_f64(self.latency.as_secs_f64() * factor)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        self.with_latency(latency)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn supports(&self, trade_type: TradeType) -> bool {
        self.supported.contains(&trade_type)
    }
}

impl PricingEngine for SimulatedEngine {
    fn price(&self, trade: &Trade) -> Result<Priced, PricingError> {
        if !self.supports(trade.trade_type()) {
            return Err(PricingError::new(UNSUPPORTED_TRADE_TYPE));
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let value = rand::thread_rng().gen::<f64>() * 100.0;

        if let Some(message) = self.failures.get(trade.trade_id()) {
            return Err(PricingError::new(message.as_str()));
        }
        let priced = Priced::new(value);
        match self.warnings.get(trade.trade_id()) {
            Some(warning) => Ok(priced.with_warning(warning.as_str())),
            None => Ok(priced),
        }
    }
}

/// Default bindings: gov and corp bonds get their own engine, fx spot and
/// forward share one, supra bonds have none.
///
/// `latency_scale` multiplies every engine's latency; `1.0` keeps the
/// multi-second defaults.
pub fn standard_registry(latency_scale: f64) -> EngineRegistry {
    let fx: Arc<dyn PricingEngine> = Arc::new(SimulatedEngine::fx().scale_latency(latency_scale));
    EngineRegistry::new()
        .with_engine(
            TradeType::GovBond,
            Arc::new(SimulatedEngine::gov_bond().scale_latency(latency_scale)),
        )
        .with_engine(
            TradeType::CorpBond,
            Arc::new(SimulatedEngine::corp_bond().scale_latency(latency_scale)),
        )
        .with_engine(TradeType::FxSpot, Arc::clone(&fx))
        .with_engine(TradeType::FxFwd, fx)
}
