//! Moving Average Convergence Divergence (MACD).
//!
//! Three lines (separate Indicator instances):
//! - Line: EMA(close, fast) - EMA(close, slow). Both EMAs start on the same
//!   bar: the fast EMA is seeded with the `fast` closes ending where the slow
//!   seed ends, as TA-Lib does.
//! - Signal: EMA(line, signal), seeded on the first defined line values
//! - Histogram: line - signal
//!
//! Lookback: slow - 1 for the line, slow + signal - 2 for signal and histogram.

use super::ema::ema_of_series;
use crate::components::indicator::Indicator;
use crate::domain::Candle;

/// Which MACD output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
    name: String,
}

impl Macd {
    pub fn new(line: MacdLine, fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be shorter than slow period");
        let label = match line {
            MacdLine::Line => "line",
            MacdLine::Signal => "signal",
            MacdLine::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            line,
            name: format!("macd_{label}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn line(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(MacdLine::Line, fast, slow, signal)
    }

    pub fn signal(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(MacdLine::Signal, fast, slow, signal)
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(MacdLine::Histogram, fast, slow, signal)
    }
}

/// Compute (line, signal, histogram) over an arbitrary close series.
pub fn macd_of_series(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let slow_ema = ema_of_series(values, slow);
    let mut fast_ema = vec![f64::NAN; values.len()];
    if let Some(first) = slow_ema.iter().position(|v| !v.is_nan()) {
        let offset = first + 1 - fast;
        let aligned = ema_of_series(&values[offset..], fast);
        fast_ema[offset..].copy_from_slice(&aligned);
    }

    // NaN - x stays NaN, so the line is defined only where both EMAs are
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&line, signal);
    let histogram: Vec<f64> = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| l - s)
        .collect();

    (line, signal_line, histogram)
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            MacdLine::Line => self.slow - 1,
            MacdLine::Signal | MacdLine::Histogram => self.slow + self.signal - 2,
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (line, signal, histogram) = macd_of_series(&closes, self.fast, self.slow, self.signal);
        match self.line {
            MacdLine::Line => line,
            MacdLine::Signal => signal,
            MacdLine::Histogram => histogram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn macd_linear_series_is_constant() {
        // A straight line makes each seeded EMA lag by (period-1)/2, so
        // line = (slow - fast)/2 * slope, signal equals it, histogram is 0.
        let closes: Vec<f64> = (0..30).map(|i| 1.0 + 0.01 * i as f64).collect();
        let (line, signal, hist) = macd_of_series(&closes, 3, 5, 2);

        assert!(line[3].is_nan());
        assert_approx(line[4], 0.01, 1e-12);
        assert!(signal[4].is_nan());
        assert_approx(signal[5], 0.01, 1e-12);
        for i in 5..30 {
            assert_approx(line[i], 0.01, 1e-12);
            assert_approx(hist[i], 0.0, 1e-12);
        }
    }

    #[test]
    fn macd_fast_ema_seeds_on_slow_start() {
        // Fast seed = mean(0, 0) at index 3, slow seed = mean(10, 0, 0, 0).
        // An independently seeded fast EMA would still carry the early 10.
        let closes = [10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let (line, _, _) = macd_of_series(&closes, 2, 4, 2);
        assert!(line[2].is_nan());
        assert_approx(line[3], -2.5, 1e-12);
        assert_approx(line[4], -1.5, 1e-12);
    }

    #[test]
    fn macd_first_values_match_lookback() {
        let closes: Vec<f64> = (0..60).map(|i| (i as f64 * 0.3).sin() + 2.0).collect();
        let candles = make_candles(&closes);
        for macd in [Macd::line(12, 26, 9), Macd::signal(12, 26, 9), Macd::histogram(12, 26, 9)] {
            let out = macd.compute(&candles);
            let first = out.iter().position(|v| !v.is_nan()).unwrap();
            assert_eq!(first, macd.lookback(), "{}", macd.name());
        }
    }

    #[test]
    fn macd_turning_up_has_positive_histogram() {
        // Falls for a while then rallies hard: line crosses above its signal
        let mut closes: Vec<f64> = (0..40).map(|i| 2.0 - 0.01 * i as f64).collect();
        closes.extend((1..=15).map(|i| 1.6 + 0.03 * i as f64));
        let (line, signal, hist) = macd_of_series(&closes, 12, 26, 9);
        let last = closes.len() - 1;
        assert!(hist[last] > 0.0);
        assert!(line[last] > signal[last]);
    }

    #[test]
    fn macd_too_short_is_all_nan() {
        let candles = make_candles(&[1.0; 20]);
        assert!(Macd::histogram(12, 26, 9)
            .compute(&candles)
            .iter()
            .all(|v| v.is_nan()));
    }

    #[test]
    #[should_panic(expected = "fast period must be shorter")]
    fn macd_rejects_inverted_periods() {
        Macd::line(26, 12, 9);
    }
}
