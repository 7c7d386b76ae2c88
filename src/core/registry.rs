use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::trade::{Trade, TradeType};

/// A successful price, optionally accompanied by a non-fatal warning.
#[derive(Clone, Debug, PartialEq)]
pub struct Priced {
    pub value: f64,
    pub warning: Option<String>,
}

impl Priced {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Failure to price one trade. Recorded against that trade only.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PricingError {
    message: String,
}

impl PricingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for PricingError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for PricingError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Computes a price for a trade. Calls may block for a long time.
pub trait PricingEngine: Send + Sync {
    fn price(&self, trade: &Trade) -> Result<Priced, PricingError>;
}

impl<F> PricingEngine for F
where
    F: Fn(&Trade) -> Result<Priced, PricingError> + Send + Sync,
{
    fn price(&self, trade: &Trade) -> Result<Priced, PricingError> {
        self(trade)
    }
}

/// Read-only mapping from trade type to pricing engine.
///
/// Populated before a run and shared by reference with every worker.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<TradeType, Arc<dyn PricingEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `engine` to `trade_type`, returning any engine it replaced.
    pub fn register(
        &mut self,
        trade_type: TradeType,
        engine: Arc<dyn PricingEngine>,
    ) -> Option<Arc<dyn PricingEngine>> {
        let previous = self.engines.insert(trade_type, engine);
        if previous.is_some() {
            log::warn!("replacing pricing engine for {trade_type}");
        }
        previous
    }

    pub fn with_engine(mut self, trade_type: TradeType, engine: Arc<dyn PricingEngine>) -> Self {
        self.register(trade_type, engine);
        self
    }

    pub fn engine_for(&self, trade_type: TradeType) -> Option<Arc<dyn PricingEngine>> {
        self.engines.get(&trade_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Registered trade types in sorted order.
    pub fn trade_types(&self) -> Vec<TradeType> {
        let mut types: Vec<_> = self.engines.keys().copied().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("trade_types", &self.trade_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_replace() {
        let fixed = |_: &Trade| -> Result<Priced, PricingError> { Ok(Priced::new(1.0)) };
        let failing = |_: &Trade| -> Result<Priced, PricingError> { Err("nope".into()) };

        let mut registry = EngineRegistry::new().with_engine(TradeType::FxSpot, Arc::new(fixed));
        assert_eq!(registry.len(), 1);
        assert!(registry.engine_for(TradeType::GovBond).is_none());

        let trade = Trade::new("FX1", TradeType::FxSpot).unwrap();
        let engine = registry.engine_for(TradeType::FxSpot).unwrap();
        assert_eq!(engine.price(&trade).unwrap(), Priced::new(1.0));

        assert!(registry
            .register(TradeType::FxSpot, Arc::new(failing))
            .is_some());
        let engine = registry.engine_for(TradeType::FxSpot).unwrap();
        assert_eq!(engine.price(&trade).unwrap_err().message(), "nope");
        assert_eq!(registry.trade_types(), vec![TradeType::FxSpot]);
    }
}
