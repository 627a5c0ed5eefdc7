//! Indicator trait and computed indicator series container.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! Every series is recomputed on each evaluation; nothing is cached between
//! calls.

use crate::domain::Candle;
use std::collections::HashMap;

/// Trait for indicators.
///
/// Indicators take a full candle series and produce a numeric output series
/// of the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// No indicator value at index t may depend on candle data from t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_12", "atr_10").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// The last finite value of a series, scanning back from the tail.
///
/// Warmup `NaN`s at the head and poisoned `NaN`s at the tail are skipped;
/// `None` when no entry is finite.
pub fn last_valid(series: &[f64]) -> Option<f64> {
    series.iter().rev().copied().find(|v| v.is_finite())
}

/// Container for computed indicator series, keyed by indicator name.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `indicator` over `candles` and store the series under its name.
    pub fn compute(&mut self, indicator: &dyn Indicator, candles: &[Candle]) {
        self.insert(indicator.name(), indicator.compute(candles));
    }

    /// Insert a named indicator series.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Get the indicator value at a specific index.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied())
    }

    /// Get the full series for a named indicator.
    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Last finite value of a named series (see [`last_valid`]).
    pub fn last_valid(&self, name: &str) -> Option<f64> {
        self.get_series(name).and_then(last_valid)
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
