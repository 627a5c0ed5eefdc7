//! In-memory provider with fixed series and injectable failures.

use super::provider::{finalize_candles, DataError, MarketDataProvider};
use crate::domain::{Candle, Interval};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct StaticProvider {
    candles: HashMap<Interval, Vec<Candle>>,
    candle_failures: HashMap<Interval, DataError>,
    price: Option<f64>,
    price_failure: Option<DataError>,
    candle_calls: AtomicUsize,
    price_calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, interval: Interval, candles: Vec<Candle>) -> Self {
        self.candles.insert(interval, candles);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Make `fetch_candles` for `interval` fail with `error`.
    pub fn failing_candles(mut self, interval: Interval, error: DataError) -> Self {
        self.candle_failures.insert(interval, error);
        self
    }

    /// Make `fetch_price` fail with `error`.
    pub fn failing_price(mut self, error: DataError) -> Self {
        self.price_failure = Some(error);
        self
    }

    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::Relaxed)
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::Relaxed)
    }
}

impl MarketDataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        self.candle_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.candle_failures.get(&interval) {
            return Err(err.clone());
        }
        let candles = self.candles.get(&interval).cloned().unwrap_or_default();
        finalize_candles(candles, count, symbol, interval)
    }

    fn fetch_price(&self, symbol: &str) -> Result<f64, DataError> {
        self.price_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = &self.price_failure {
            return Err(err.clone());
        }
        self.price.ok_or_else(|| DataError::NoData {
            symbol: symbol.to_string(),
            interval: "price".into(),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
