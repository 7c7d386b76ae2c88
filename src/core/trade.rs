use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::core::{Error, Result};

/// Registry lookup key for a trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeType {
    GovBond,
    CorpBond,
    SupraBond,
    FxSpot,
    FxFwd,
}

impl TradeType {
    pub const ALL: [TradeType; 5] = [
        TradeType::GovBond,
        TradeType::CorpBond,
        TradeType::SupraBond,
        TradeType::FxSpot,
        TradeType::FxFwd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::GovBond => "GovBond",
            TradeType::CorpBond => "CorpBond",
            TradeType::SupraBond => "SupraBond",
            TradeType::FxSpot => "FxSpot",
            TradeType::FxFwd => "FxFwd",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "GovBond" => Ok(TradeType::GovBond),
            "CorpBond" => Ok(TradeType::CorpBond),
            "Supra" | "SupraBond" => Ok(TradeType::SupraBond),
            "FxSpot" => Ok(TradeType::FxSpot),
            "FxFwd" => Ok(TradeType::FxFwd),
            other => Err(Error::InvalidTrade(format!("unknown trade type {other:?}"))),
        }
    }
}

/// A single trade to be priced.
///
/// The pipeline only reads `trade_id` and `trade_type`; the remaining fields
/// are carried through for pricing engines.
#[derive(Clone, Debug, PartialEq)]
pub struct Trade {
    trade_id: String,
    trade_type: TradeType,
    trade_date: Option<Date>,
    instrument: Option<String>,
    counterparty: Option<String>,
    notional: f64,
    rate: f64,
    value_date: Option<Date>,
}

impl Trade {
    pub fn new(trade_id: impl Into<String>, trade_type: TradeType) -> Result<Self> {
        let trade_id = trade_id.into();
        if trade_id.trim().is_empty() {
            return Err(Error::InvalidTrade("trade id must be non-empty".to_string()));
        }
        Ok(Self {
            trade_id,
            trade_type,
            trade_date: None,
            instrument: None,
            counterparty: None,
            notional: 0.0,
            rate: 0.0,
            value_date: None,
        })
    }

    pub fn with_trade_date(mut self, date: Date) -> Self {
        self.trade_date = Some(date);
        self
    }

    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = Some(instrument.into());
        self
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_notional(mut self, notional: f64) -> Self {
        self.notional = notional;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_value_date(mut self, date: Date) -> Self {
        self.value_date = Some(date);
        self
    }

    pub fn trade_id(&self) -> &str {
        &self.trade_id
    }

    pub fn trade_type(&self) -> TradeType {
        self.trade_type
    }

    pub fn trade_date(&self) -> Option<Date> {
        self.trade_date
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn counterparty(&self) -> Option<&str> {
        self.counterparty.as_deref()
    }

    pub fn notional(&self) -> f64 {
        self.notional
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn value_date(&self) -> Option<Date> {
        self.value_date
    }
}
