//! Thread-safe store of per-trade pricing outcomes.
//!
//! Results and errors live in two insertion-ordered tables behind one mutex.
//! A trade id may hold at most one result and at most one error. The first
//! write of each kind wins; a repeat is rejected with
//! [`Error::DuplicateResult`] or [`Error::DuplicateError`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::core::{Error, Result};

/// One trade's recorded outcome.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalarResult {
    pub trade_id: String,
    pub result: Option<f64>,
    pub error: Option<String>,
}

/// Classification of a [`ScalarResult`].
#[derive(Clone, Debug, PartialEq)]
pub enum PriceOutcome {
    Priced(f64),
    PricedWithWarning { value: f64, warning: String },
    Failed(String),
}

impl ScalarResult {
    pub fn outcome(&self) -> Option<PriceOutcome> {
        match (self.result, &self.error) {
            (Some(value), None) => Some(PriceOutcome::Priced(value)),
            (Some(value), Some(warning)) => Some(PriceOutcome::PricedWithWarning {
                value,
                warning: warning.clone(),
            }),
            (None, Some(error)) => Some(PriceOutcome::Failed(error.clone())),
            (None, None) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    pub fn has_warning(&self) -> bool {
        self.result.is_some() && self.error.is_some()
    }

    pub fn is_failure(&self) -> bool {
        self.result.is_none() && self.error.is_some()
    }
}

#[derive(Default)]
struct Tables {
    results: Vec<(String, f64)>,
    result_index: HashMap<String, usize>,
    errors: Vec<(String, String)>,
    error_index: HashMap<String, usize>,
}

impl Tables {
    fn result(&self, trade_id: &str) -> Option<f64> {
        self.result_index
            .get(trade_id)
            .map(|&idx| self.results[idx].1)
    }

    fn error(&self, trade_id: &str) -> Option<&str> {
        self.error_index
            .get(trade_id)
            .map(|&idx| self.errors[idx].1.as_str())
    }

    fn contains(&self, trade_id: &str) -> bool {
        self.result_index.contains_key(trade_id) || self.error_index.contains_key(trade_id)
    }

    fn distinct(&self) -> usize {
        self.results.len()
            + self
                .errors
                .iter()
                .filter(|(trade_id, _)| !self.result_index.contains_key(trade_id))
                .count()
    }

    // Results first in insertion order, then error-only trades.
    fn collect(&self) -> Vec<ScalarResult> {
        let mut out = Vec::with_capacity(self.distinct());
        for (trade_id, value) in &self.results {
            out.push(ScalarResult {
                trade_id: trade_id.clone(),
                result: Some(*value),
                error: self.error(trade_id).map(str::to_string),
            });
        }
        for (trade_id, error) in &self.errors {
            if self.result_index.contains_key(trade_id) {
                continue;
            }
            out.push(ScalarResult {
                trade_id: trade_id.clone(),
                result: None,
                error: Some(error.clone()),
            });
        }
        out
    }
}

#[derive(Default)]
pub struct ScalarResults {
    tables: Mutex<Tables>,
}

impl ScalarResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&self, trade_id: &str, value: f64) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.result_index.contains_key(trade_id) {
            return Err(Error::DuplicateResult(trade_id.to_string()));
        }
        let idx = tables.results.len();
        tables.results.push((trade_id.to_string(), value));
        tables.result_index.insert(trade_id.to_string(), idx);
        Ok(())
    }

    pub fn add_error(&self, trade_id: &str, message: impl Into<String>) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.error_index.contains_key(trade_id) {
            return Err(Error::DuplicateError(trade_id.to_string()));
        }
        let idx = tables.errors.len();
        tables.errors.push((trade_id.to_string(), message.into()));
        tables.error_index.insert(trade_id.to_string(), idx);
        Ok(())
    }

    pub fn get(&self, trade_id: &str) -> Option<ScalarResult> {
        let tables = self.read();
        if !tables.contains(trade_id) {
            return None;
        }
        Some(ScalarResult {
            trade_id: trade_id.to_string(),
            result: tables.result(trade_id),
            error: tables.error(trade_id).map(str::to_string),
        })
    }

    pub fn contains(&self, trade_id: &str) -> bool {
        self.read().contains(trade_id)
    }

    /// Number of distinct trade ids recorded.
    pub fn len(&self) -> usize {
        self.read().distinct()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry: trades with a result first, then error-only trades.
    pub fn snapshot(&self) -> Vec<ScalarResult> {
        self.read().collect()
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.tables.lock();
            panic!("poisoning result store");
        }));
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Poisoned("result store lock poisoned"))
    }

    // Each mutation is a single push + insert, so a poisoned table is still
    // consistent for readers.
    fn read(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IntoIterator for ScalarResults {
    type Item = ScalarResult;
    type IntoIter = std::vec::IntoIter<ScalarResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .collect()
            .into_iter()
    }
}
