//! Indicator snapshot calculator.
//!
//! Runs every configured indicator over one timeframe's candles and keeps the
//! last defined value of each series. The result is all-or-nothing: a single
//! series without a terminal value invalidates the whole snapshot.

use crate::components::{Indicator, IndicatorValues};
use crate::config::IndicatorConfig;
use crate::domain::{Candle, IndicatorSnapshot};
use crate::indicators::{Atr, Bollinger, Ema, Macd, Rsi};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Fewer candles than the configured minimum. Expected during warm-up.
    #[error("not enough data: have {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    /// Enough candles, but the named series never produced a defined value.
    #[error("indicator {indicator} has no defined value")]
    Unstable { indicator: String },
}

/// The indicator set used for one snapshot, in field order.
struct IndicatorSet {
    ema_fast: Ema,
    ema_slow: Ema,
    rsi: Rsi,
    macd: Macd,
    macd_signal: Macd,
    macd_hist: Macd,
    atr: Atr,
    upper: Bollinger,
    middle: Bollinger,
    lower: Bollinger,
}

impl IndicatorSet {
    fn from_config(config: &IndicatorConfig) -> Self {
        let (f, s, sig) = (config.macd_fast, config.macd_slow, config.macd_signal);
        let (bp, bk) = (config.bollinger_period, config.bollinger_stddev);
        Self {
            ema_fast: Ema::new(config.ema_fast),
            ema_slow: Ema::new(config.ema_slow),
            rsi: Rsi::new(config.rsi_period),
            macd: Macd::line(f, s, sig),
            macd_signal: Macd::signal(f, s, sig),
            macd_hist: Macd::histogram(f, s, sig),
            atr: Atr::new(config.atr_period),
            upper: Bollinger::upper(bp, bk),
            middle: Bollinger::middle(bp, bk),
            lower: Bollinger::lower(bp, bk),
        }
    }

    fn all(&self) -> [&dyn Indicator; 10] {
        [
            &self.ema_fast,
            &self.ema_slow,
            &self.rsi,
            &self.macd,
            &self.macd_signal,
            &self.macd_hist,
            &self.atr,
            &self.upper,
            &self.middle,
            &self.lower,
        ]
    }
}

/// Compute an `IndicatorSnapshot` from one timeframe's ordered candles.
///
/// `config` must be valid (see `SignalConfig::validate`).
pub fn compute_snapshot(
    candles: &[Candle],
    config: &IndicatorConfig,
) -> Result<IndicatorSnapshot, SnapshotError> {
    if candles.len() < config.min_candles {
        return Err(SnapshotError::InsufficientHistory {
            have: candles.len(),
            need: config.min_candles,
        });
    }

    let set = IndicatorSet::from_config(config);
    let mut values = IndicatorValues::new();
    for indicator in set.all() {
        values.compute(indicator, candles);
    }

    let last = |indicator: &dyn Indicator| -> Result<f64, SnapshotError> {
        values
            .last_valid(indicator.name())
            .ok_or_else(|| SnapshotError::Unstable {
                indicator: indicator.name().to_string(),
            })
    };

    let price = candles
        .last()
        .map(|c| c.close)
        .filter(|p| p.is_finite())
        .ok_or_else(|| SnapshotError::Unstable {
            indicator: "price".into(),
        })?;

    Ok(IndicatorSnapshot {
        ema_fast: last(&set.ema_fast)?,
        ema_slow: last(&set.ema_slow)?,
        rsi: last(&set.rsi)?,
        macd: last(&set.macd)?,
        macd_signal: last(&set.macd_signal)?,
        macd_hist: last(&set.macd_hist)?,
        atr: last(&set.atr)?,
        upper_band: last(&set.upper)?,
        middle_band: last(&set.middle)?,
        lower_band: last(&set.lower)?,
        price,
    })
}
