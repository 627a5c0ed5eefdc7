//! Weighted confluence vote across the fast and slow timeframes.

use crate::config::ThresholdConfig;
use crate::domain::{Bias, Factor, IndicatorSnapshot, Interval, Tally, Vote};

/// Weight of the slow timeframe's trend vote.
pub const SLOW_TREND_WEIGHT: u32 = 2;

/// Count every vote for one evaluation.
///
/// Trend always votes on both timeframes (slow at double weight). RSI and
/// MACD vote per timeframe only when they lean one way. The Bollinger band
/// votes on the fast timeframe only, against the live `price`.
pub fn tally_votes(
    fast: (Interval, &IndicatorSnapshot),
    slow: (Interval, &IndicatorSnapshot),
    price: f64,
    thresholds: &ThresholdConfig,
) -> Tally {
    let (fast_iv, fast_snap) = fast;
    let (slow_iv, slow_snap) = slow;
    let mut votes = Vec::with_capacity(8);

    votes.push(trend_vote(fast_iv, fast_snap, 1));
    votes.push(trend_vote(slow_iv, slow_snap, SLOW_TREND_WEIGHT));

    for (iv, snap) in [(fast_iv, fast_snap), (slow_iv, slow_snap)] {
        votes.extend(momentum_vote(iv, snap, thresholds));
    }
    for (iv, snap) in [(fast_iv, fast_snap), (slow_iv, slow_snap)] {
        votes.extend(macd_vote(iv, snap));
    }

    votes.extend(band_vote(fast_iv, fast_snap, price));

    Tally::from_votes(votes)
}

fn trend_vote(timeframe: Interval, snap: &IndicatorSnapshot, weight: u32) -> Vote {
    let bias = if snap.is_uptrend() {
        Bias::Bullish
    } else {
        Bias::Bearish
    };
    Vote {
        factor: Factor::Trend,
        timeframe,
        bias,
        weight,
    }
}

fn momentum_vote(
    timeframe: Interval,
    snap: &IndicatorSnapshot,
    thresholds: &ThresholdConfig,
) -> Option<Vote> {
    let bias = if snap.rsi < thresholds.rsi_oversold {
        Bias::Bullish
    } else if snap.rsi > thresholds.rsi_overbought {
        Bias::Bearish
    } else {
        return None;
    };
    Some(Vote {
        factor: Factor::Momentum,
        timeframe,
        bias,
        weight: 1,
    })
}

fn macd_vote(timeframe: Interval, snap: &IndicatorSnapshot) -> Option<Vote> {
    let bias = if snap.macd_hist > 0.0 && snap.macd > snap.macd_signal {
        Bias::Bullish
    } else if snap.macd_hist < 0.0 && snap.macd < snap.macd_signal {
        Bias::Bearish
    } else {
        return None;
    };
    Some(Vote {
        factor: Factor::Macd,
        timeframe,
        bias,
        weight: 1,
    })
}

fn band_vote(timeframe: Interval, snap: &IndicatorSnapshot, price: f64) -> Option<Vote> {
    let bias = if price < snap.lower_band {
        Bias::Bullish
    } else if price > snap.upper_band {
        Bias::Bearish
    } else {
        return None;
    };
    Some(Vote {
        factor: Factor::PriceBand,
        timeframe,
        bias,
        weight: 1,
    })
}
