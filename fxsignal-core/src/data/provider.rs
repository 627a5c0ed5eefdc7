//! Market data provider trait and structured error types.
//!
//! The `MarketDataProvider` trait abstracts over data sources (Twelve Data,
//! CSV files, in-memory fixtures) so the pipeline can swap implementations
//! and tests can inject failures.

use crate::domain::{Candle, Interval};
use thiserror::Error;

/// Structured error types for data operations.
///
/// Every variant maps to an ERROR decision; none escapes the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no data for {symbol} {interval}")]
    NoData { symbol: String, interval: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("csv error: {0}")]
    Csv(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Source of candles and live prices for one instrument at a time.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// The most recent `count` candles for `symbol` on `interval`, oldest first.
    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, DataError>;

    /// The live price for `symbol`.
    fn fetch_price(&self, symbol: &str) -> Result<f64, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        (**self).fetch_candles(symbol, interval, count)
    }

    fn fetch_price(&self, symbol: &str) -> Result<f64, DataError> {
        (**self).fetch_price(symbol)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        (**self).fetch_candles(symbol, interval, count)
    }

    fn fetch_price(&self, symbol: &str) -> Result<f64, DataError> {
        (**self).fetch_price(symbol)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Keep the last `count` candles and reject out-of-order series.
pub fn finalize_candles(
    mut candles: Vec<Candle>,
    count: usize,
    symbol: &str,
    interval: Interval,
) -> Result<Vec<Candle>, DataError> {
    if candles.is_empty() {
        return Err(DataError::NoData {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        });
    }
    if !crate::domain::is_chronological(&candles) {
        return Err(DataError::ResponseFormatChanged(format!(
            "{symbol} {interval} candles are not strictly increasing in time"
        )));
    }
    if candles.len() > count {
        candles.drain(..candles.len() - count);
    }
    Ok(candles)
}
