//! Domain types: candles, intervals, indicator snapshots and signal decisions.

pub mod candle;
pub mod decision;
pub mod interval;
pub mod snapshot;

pub use candle::{is_chronological, Candle};
pub use decision::{confidence, Bias, Direction, Factor, SignalDecision, Tally, Vote};
pub use interval::{Interval, ParseIntervalError};
pub use snapshot::IndicatorSnapshot;

/// Instrument symbol, e.g. `GBP/USD`.
pub type Symbol = String;
