//! Component traits.
//!
//! The indicator trait for precomputed numeric series plus the named-series
//! container the snapshot calculator reads from.

pub mod indicator;

pub use indicator::{last_valid, Indicator, IndicatorValues};
