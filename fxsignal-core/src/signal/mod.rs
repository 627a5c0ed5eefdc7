//! Signal engine: confluence vote, decision rule and risk levels.
//!
//! The engine is pure and stateless. Identical snapshots and price always
//! produce the identical decision; there is no hysteresis or repeat
//! suppression between evaluations.

pub mod risk;
pub mod votes;

pub use risk::RiskLevels;
pub use votes::{tally_votes, SLOW_TREND_WEIGHT};

use crate::config::{RiskConfig, SignalConfig, ThresholdConfig};
use crate::domain::{Bias, Direction, IndicatorSnapshot, Interval, SignalDecision, Tally};
use std::fmt::Write as _;

/// Decision rule over a fast and a slow timeframe snapshot.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    fast_interval: Interval,
    slow_interval: Interval,
    thresholds: ThresholdConfig,
    risk: RiskConfig,
}

impl SignalEngine {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            fast_interval: config.fast_interval,
            slow_interval: config.slow_interval,
            thresholds: config.thresholds.clone(),
            risk: config.risk.clone(),
        }
    }

    pub fn fast_interval(&self) -> Interval {
        self.fast_interval
    }

    pub fn slow_interval(&self) -> Interval {
        self.slow_interval
    }

    /// Count the votes for these snapshots at the live `price`.
    pub fn tally(&self, fast: &IndicatorSnapshot, slow: &IndicatorSnapshot, price: f64) -> Tally {
        tally_votes(
            (self.fast_interval, fast),
            (self.slow_interval, slow),
            price,
            &self.thresholds,
        )
    }

    /// Direction implied by a tally: the non-tied majority when confidence
    /// strictly exceeds the threshold, HOLD otherwise.
    pub fn direction_for(&self, tally: &Tally) -> Direction {
        if tally.confidence <= self.thresholds.confidence {
            return Direction::Hold;
        }
        match tally.majority() {
            Some(Bias::Bullish) => Direction::Buy,
            Some(Bias::Bearish) => Direction::Sell,
            None => Direction::Hold,
        }
    }

    /// Decide BUY, SELL or HOLD from both snapshots and the live price.
    ///
    /// Risk levels use the fast timeframe's ATR.
    pub fn decide(
        &self,
        fast: &IndicatorSnapshot,
        slow: &IndicatorSnapshot,
        price: f64,
    ) -> SignalDecision {
        let tally = self.tally(fast, slow, price);
        let direction = self.direction_for(&tally);
        let levels = RiskLevels::for_direction(direction, price, fast.atr, &self.risk);
        let rationale = self.rationale(direction, fast, slow, &tally);

        SignalDecision {
            direction,
            rationale,
            entry_price: levels.entry,
            take_profit: levels.take_profit,
            stop_loss: levels.stop_loss,
            tally: Some(tally),
        }
    }

    fn rationale(
        &self,
        direction: Direction,
        fast: &IndicatorSnapshot,
        slow: &IndicatorSnapshot,
        tally: &Tally,
    ) -> String {
        let mut text = String::new();
        match direction {
            Direction::Buy | Direction::Sell => {
                let (headline, cmp) = if direction == Direction::Buy {
                    ("BULLISH", '>')
                } else {
                    ("BEARISH", '<')
                };
                let _ = writeln!(text, "Multi-timeframe {headline} confluence");
                let _ = writeln!(
                    text,
                    "{} EMA: {:.5} {cmp} {:.5}",
                    self.fast_interval, fast.ema_fast, fast.ema_slow
                );
                let _ = writeln!(text, "{} RSI: {:.2}", self.slow_interval, slow.rsi);
                let _ = writeln!(text, "MACD Hist: {:.5}", fast.macd_hist);
                let _ = write!(
                    text,
                    "Confidence: {:.1}% ({} bullish / {} bearish)",
                    tally.confidence, tally.bullish, tally.bearish
                );
                for vote in &tally.votes {
                    let bias = match vote.bias {
                        Bias::Bullish => "bullish",
                        Bias::Bearish => "bearish",
                    };
                    let _ = write!(
                        text,
                        "\n- {} {}: {bias} +{}",
                        vote.timeframe,
                        vote.factor.label(),
                        vote.weight
                    );
                }
            }
            _ => {
                let _ = writeln!(text, "Market is consolidating");
                let _ = writeln!(text, "{} RSI: {:.2}", self.fast_interval, fast.rsi);
                let _ = write!(text, "Price near middle BB: {:.5}", fast.middle_band);
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema_fast: 1.2650,
            ema_slow: 1.2600,
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_hist: 0.0,
            atr: 0.0010,
            upper_band: 1.2700,
            middle_band: 1.2620,
            lower_band: 1.2550,
            price: 1.2600,
        }
    }

    fn engine() -> SignalEngine {
        SignalEngine::new(&SignalConfig::default())
    }

    #[test]
    fn full_bullish_confluence_is_buy() {
        let mut fast = base();
        fast.rsi = 25.0;
        fast.macd = 0.0004;
        fast.macd_signal = 0.0002;
        fast.macd_hist = 0.0002;
        let slow = base();

        let d = engine().decide(&fast, &slow, 1.2500);
        let tally = d.tally.as_ref().unwrap();
        assert_eq!((tally.bullish, tally.bearish), (5, 0));
        assert_eq!(tally.confidence, 100.0);
        assert_eq!(d.direction, Direction::Buy);
        assert_eq!(d.entry_price, 1.2500);
        assert!((d.stop_loss - (1.2500 - 0.0010 * 0.8)).abs() < 1e-12);
        assert!((d.take_profit - (1.2500 + 0.0010 * 1.2)).abs() < 1e-12);
        assert!(d.rationale.starts_with("Multi-timeframe BULLISH confluence"));
        assert!(d.rationale.contains("15min EMA: 1.26500 > 1.26000"));
        assert!(d.rationale.contains("1h RSI: 50.00"));
        assert!(d.rationale.contains("Confidence: 100.0%"));
    }

    #[test]
    fn full_bearish_confluence_is_sell() {
        let mut fast = base();
        fast.ema_fast = 1.2550;
        fast.rsi = 80.0;
        let mut slow = base();
        slow.ema_fast = 1.2550;

        let d = engine().decide(&fast, &slow, 1.2600);
        assert_eq!(d.direction, Direction::Sell);
        assert!(d.take_profit < d.entry_price && d.entry_price < d.stop_loss);
        assert!(d.rationale.contains("BEARISH"));
        assert!(d.rationale.contains("<"));
    }

    #[test]
    fn split_votes_hold_at_price() {
        // fast bullish trend (1) + slow bearish trend (2) + fast oversold (1) → 2 vs 2
        let mut fast = base();
        fast.rsi = 20.0;
        let mut slow = base();
        slow.ema_fast = 1.2500;

        let d = engine().decide(&fast, &slow, 1.2600);
        assert_eq!(d.confidence(), Some(0.0));
        assert_eq!(d.direction, Direction::Hold);
        assert_eq!((d.entry_price, d.take_profit, d.stop_loss), (1.2600, 1.2600, 1.2600));
        assert!(d.rationale.starts_with("Market is consolidating"));
        assert!(d.rationale.contains("Price near middle BB: 1.26200"));
    }

    #[test]
    fn confidence_at_threshold_holds() {
        let mut config = SignalConfig::default();
        config.thresholds.confidence = 100.0 / 3.0 + 1e-9;
        let engine = SignalEngine::new(&config);

        // 4 bullish vs 2 bearish → 33.3%
        let mut fast = base();
        fast.rsi = 20.0;
        fast.macd = 0.0004;
        fast.macd_signal = 0.0002;
        fast.macd_hist = 0.0002;
        let mut slow = base();
        slow.ema_fast = 1.2500;
        let d = engine.decide(&fast, &slow, 1.2450);
        let tally = d.tally.as_ref().unwrap();
        assert_eq!((tally.bullish, tally.bearish), (4, 2));
        assert_eq!(d.direction, Direction::Hold);

        assert_eq!(self::engine().decide(&fast, &slow, 1.2450).direction, Direction::Buy);
    }

    #[test]
    fn decision_is_deterministic() {
        let fast = base();
        let slow = base();
        let e = engine();
        assert_eq!(e.decide(&fast, &slow, 1.26), e.decide(&fast, &slow, 1.26));
    }
}
