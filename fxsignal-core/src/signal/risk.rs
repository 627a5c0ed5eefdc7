//! Stop-loss and take-profit levels from volatility.

use crate::config::RiskConfig;
use crate::domain::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl RiskLevels {
    /// Levels for `direction` at `price` with the fast-timeframe `atr`.
    ///
    /// BUY: stop below, target above. SELL: mirrored. Any other direction
    /// collapses all three levels onto `price`.
    pub fn for_direction(direction: Direction, price: f64, atr: f64, risk: &RiskConfig) -> Self {
        let stop_distance = atr * risk.atr_sl_multiplier;
        let target_distance = atr * risk.atr_tp_multiplier();
        match direction {
            Direction::Buy => Self {
                entry: price,
                stop_loss: price - stop_distance,
                take_profit: price + target_distance,
            },
            Direction::Sell => Self {
                entry: price,
                stop_loss: price + stop_distance,
                take_profit: price - target_distance,
            },
            Direction::Hold | Direction::Analyzing | Direction::Error => Self {
                entry: price,
                stop_loss: price,
                take_profit: price,
            },
        }
    }

    /// Stop distance in pips (1 pip = 0.0001).
    pub fn pip_risk(&self) -> f64 {
        (self.entry - self.stop_loss).abs() * 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_levels() {
        let levels = RiskLevels::for_direction(Direction::Buy, 1.2500, 0.0010, &RiskConfig::default());
        assert!((levels.stop_loss - 1.2492).abs() < 1e-12);
        assert!((levels.take_profit - 1.2512).abs() < 1e-12);
        assert!((levels.pip_risk() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn sell_levels_mirror_buy() {
        let levels = RiskLevels::for_direction(Direction::Sell, 1.2500, 0.0010, &RiskConfig::default());
        assert!((levels.stop_loss - 1.2508).abs() < 1e-12);
        assert!((levels.take_profit - 1.2488).abs() < 1e-12);
    }

    #[test]
    fn hold_collapses_to_price() {
        let levels = RiskLevels::for_direction(Direction::Hold, 1.2500, 0.0010, &RiskConfig::default());
        assert_eq!((levels.stop_loss, levels.take_profit), (1.2500, 1.2500));
    }
}
