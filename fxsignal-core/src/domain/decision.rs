//! SignalDecision: the engine's output for one evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Interval;

/// Outcome category of an evaluation. Every failure mode is encoded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
    Analyzing,
    Error,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
            Direction::Analyzing => "ANALYZING",
            Direction::Error => "ERROR",
        }
    }

    /// True only for BUY and SELL.
    pub fn is_tradable(&self) -> bool {
        matches!(self, Direction::Buy | Direction::Sell)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
}

/// Indicator family a vote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Trend,
    Momentum,
    Macd,
    PriceBand,
}

impl Factor {
    pub fn label(&self) -> &'static str {
        match self {
            Factor::Trend => "EMA trend",
            Factor::Momentum => "RSI",
            Factor::Macd => "MACD",
            Factor::PriceBand => "Bollinger band",
        }
    }
}

/// One counted contribution to the confluence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub factor: Factor,
    pub timeframe: Interval,
    pub bias: Bias,
    pub weight: u32,
}

/// Vote breakdown and resulting confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub votes: Vec<Vote>,
    pub bullish: u32,
    pub bearish: u32,
    /// |bullish - bearish| / (bullish + bearish) * 100, or 0 with no votes.
    pub confidence: f64,
}

impl Tally {
    pub fn from_votes(votes: Vec<Vote>) -> Self {
        let weight_of = |bias: Bias| -> u32 {
            votes
                .iter()
                .filter(|v| v.bias == bias)
                .map(|v| v.weight)
                .sum()
        };
        let bullish = weight_of(Bias::Bullish);
        let bearish = weight_of(Bias::Bearish);
        Self {
            confidence: confidence(bullish, bearish),
            votes,
            bullish,
            bearish,
        }
    }

    pub fn total(&self) -> u32 {
        self.bullish + self.bearish
    }

    /// Majority bias, `None` on a tie.
    pub fn majority(&self) -> Option<Bias> {
        match self.bullish.cmp(&self.bearish) {
            std::cmp::Ordering::Greater => Some(Bias::Bullish),
            std::cmp::Ordering::Less => Some(Bias::Bearish),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Confidence percentage for a bullish/bearish split. Always within [0, 100].
pub fn confidence(bullish: u32, bearish: u32) -> f64 {
    let total = bullish + bearish;
    if total == 0 {
        return 0.0;
    }
    f64::from(bullish.abs_diff(bearish)) / f64::from(total) * 100.0
}

/// A directional signal with entry and risk levels.
///
/// Produced fresh per evaluation and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDecision {
    pub direction: Direction,
    pub rationale: String,
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// Present when votes were counted (BUY, SELL, HOLD).
    pub tally: Option<Tally>,
}

impl SignalDecision {
    /// Market data or price unobtainable. All price fields are zero.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            direction: Direction::Error,
            rationale: reason.into(),
            entry_price: 0.0,
            take_profit: 0.0,
            stop_loss: 0.0,
            tally: None,
        }
    }

    /// Indicators not yet usable. Target and stop are zero.
    pub fn analyzing(reason: impl Into<String>, entry_price: f64) -> Self {
        Self {
            direction: Direction::Analyzing,
            rationale: reason.into(),
            entry_price,
            take_profit: 0.0,
            stop_loss: 0.0,
            tally: None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        self.tally.as_ref().map(|t| t.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(bias: Bias, weight: u32) -> Vote {
        Vote {
            factor: Factor::Trend,
            timeframe: Interval::Min15,
            bias,
            weight,
        }
    }

    #[test]
    fn confidence_examples() {
        assert_eq!(confidence(0, 0), 0.0);
        assert_eq!(confidence(5, 0), 100.0);
        assert_eq!(confidence(3, 3), 0.0);
        assert!((confidence(4, 2) - 100.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn tally_sums_weights() {
        let tally = Tally::from_votes(vec![
            vote(Bias::Bullish, 1),
            vote(Bias::Bullish, 2),
            vote(Bias::Bearish, 1),
        ]);
        assert_eq!(tally.bullish, 3);
        assert_eq!(tally.bearish, 1);
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.majority(), Some(Bias::Bullish));
        assert!((tally.confidence - 50.0).abs() < 1e-12);
    }

    #[test]
    fn tie_has_no_majority() {
        let tally = Tally::from_votes(vec![vote(Bias::Bullish, 2), vote(Bias::Bearish, 2)]);
        assert_eq!(tally.majority(), None);
        assert_eq!(tally.confidence, 0.0);
    }

    #[test]
    fn error_decision_zeroes_prices() {
        let d = SignalDecision::error("Failed to fetch market data");
        assert_eq!(d.direction, Direction::Error);
        assert_eq!((d.entry_price, d.take_profit, d.stop_loss), (0.0, 0.0, 0.0));
        assert!(d.tally.is_none());
    }

    #[test]
    fn direction_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Direction::Analyzing).unwrap(), "\"ANALYZING\"");
        assert!(Direction::Sell.is_tradable());
        assert!(!Direction::Hold.is_tradable());
    }
}
