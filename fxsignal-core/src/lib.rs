//! fxsignal core: candles, indicators, multi-timeframe confluence scoring.
//!
//! This crate contains the signal-generation engine:
//! - Domain types (candles, intervals, snapshots, decisions)
//! - Indicator library (SMA, EMA, RSI, MACD, ATR, Bollinger)
//! - Snapshot calculator with `last_valid` terminal values
//! - Weighted confluence vote, decision rule and ATR risk levels
//! - Market data providers (Twelve Data, CSV, in-memory)
//! - TOML configuration
//!
//! The crate never logs. Every failure surfaces either as a typed error or,
//! at the pipeline boundary, as the decision's direction.

pub mod components;
pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod pipeline;
pub mod signal;
pub mod snapshot;

pub use config::{ConfigError, SignalConfig};
pub use domain::{Candle, Direction, IndicatorSnapshot, Interval, SignalDecision};
pub use pipeline::{fetch_price, generate_signal};
pub use signal::SignalEngine;
pub use snapshot::{compute_snapshot, SnapshotError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared between the scheduler thread and
    /// on-demand requests are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::IndicatorSnapshot>();
        require_sync::<domain::IndicatorSnapshot>();
        require_send::<domain::SignalDecision>();
        require_sync::<domain::SignalDecision>();
        require_send::<config::SignalConfig>();
        require_sync::<config::SignalConfig>();
        require_send::<signal::SignalEngine>();
        require_sync::<signal::SignalEngine>();
        require_send::<components::IndicatorValues>();
        require_sync::<components::IndicatorValues>();

        require_send::<data::TwelveDataProvider>();
        require_sync::<data::TwelveDataProvider>();
        require_send::<data::CsvProvider>();
        require_sync::<data::CsvProvider>();
        require_send::<data::StaticProvider>();
        require_sync::<data::StaticProvider>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
    }

    /// Architecture contract: the engine sees only snapshots and a price.
    ///
    /// `decide` takes no provider and no clock, so evaluation stays pure and
    /// deterministic. If someone adds either, this stops compiling.
    #[test]
    fn engine_decide_takes_only_snapshots_and_price() {
        fn _check(
            engine: &SignalEngine,
            fast: &IndicatorSnapshot,
            slow: &IndicatorSnapshot,
        ) -> SignalDecision {
            engine.decide(fast, slow, 1.0)
        }
    }
}
