//! IndicatorSnapshot: terminal indicator values for one timeframe.

use serde::{Deserialize, Serialize};

/// The most recent defined value of every indicator on one timeframe.
///
/// A snapshot only exists when every field is defined; an unusable series
/// is reported as `SnapshotError` by the calculator instead of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub atr: f64,
    pub upper_band: f64,
    pub middle_band: f64,
    pub lower_band: f64,
    /// Close of the last candle.
    pub price: f64,
}

impl IndicatorSnapshot {
    pub fn is_uptrend(&self) -> bool {
        self.ema_fast > self.ema_slow
    }

    pub fn band_width(&self) -> f64 {
        self.upper_band - self.lower_band
    }
}
