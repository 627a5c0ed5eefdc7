//! Evaluation entry point: fetch, snapshot, decide.
//!
//! Every failure is encoded in the returned decision's direction. Nothing is
//! logged here; callers decide what to report.

use crate::config::SignalConfig;
use crate::data::{DataError, MarketDataProvider};
use crate::domain::{Candle, SignalDecision};
use crate::signal::SignalEngine;
use crate::snapshot::{compute_snapshot, SnapshotError};

pub const MSG_MARKET_DATA: &str = "Failed to fetch market data";
pub const MSG_NOT_ENOUGH_DATA: &str = "Not enough data to calculate indicators";
pub const MSG_CURRENT_PRICE: &str = "Failed to fetch current price";
pub const MSG_CALCULATING: &str = "Calculating indicators...";

/// Candles for both timeframes, fetched concurrently.
pub fn fetch_timeframes<P>(
    provider: &P,
    config: &SignalConfig,
) -> Result<(Vec<Candle>, Vec<Candle>), DataError>
where
    P: MarketDataProvider + ?Sized,
{
    let (fast, slow) = rayon::join(
        || provider.fetch_candles(&config.symbol, config.fast_interval, config.candle_count),
        || provider.fetch_candles(&config.symbol, config.slow_interval, config.candle_count),
    );
    Ok((fast?, slow?))
}

/// The live price for the "current price" command.
pub fn fetch_price<P>(provider: &P, symbol: &str) -> Result<f64, DataError>
where
    P: MarketDataProvider + ?Sized,
{
    provider.fetch_price(symbol)
}

/// Run one full evaluation.
///
/// Order: candles (ERROR on failure), history check (ANALYZING), live price
/// (ERROR), indicator stability (ANALYZING at the live price), decision.
pub fn generate_signal<P>(provider: &P, config: &SignalConfig) -> SignalDecision
where
    P: MarketDataProvider + ?Sized,
{
    let (fast_candles, slow_candles) = match fetch_timeframes(provider, config) {
        Ok(pair) => pair,
        Err(e) => return SignalDecision::error(format!("{MSG_MARKET_DATA}: {e}")),
    };

    let fast = compute_snapshot(&fast_candles, &config.indicators);
    let slow = compute_snapshot(&slow_candles, &config.indicators);

    let insufficient = |r: &Result<_, SnapshotError>| {
        matches!(r, Err(SnapshotError::InsufficientHistory { .. }))
    };
    if insufficient(&fast) || insufficient(&slow) {
        return SignalDecision::analyzing(MSG_NOT_ENOUGH_DATA, 0.0);
    }

    let price = match provider.fetch_price(&config.symbol) {
        Ok(p) => p,
        Err(e) => return SignalDecision::error(format!("{MSG_CURRENT_PRICE}: {e}")),
    };

    match (fast, slow) {
        (Ok(fast), Ok(slow)) => SignalEngine::new(config).decide(&fast, &slow, price),
        _ => SignalDecision::analyzing(MSG_CALCULATING, price),
    }
}
