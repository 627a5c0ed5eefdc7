//! Offline provider backed by per-interval CSV files.
//!
//! Directory layout: `<dir>/<interval>.csv` (e.g. `15min.csv`, `1h.csv`)
//! with header `timestamp,open,high,low,close,volume`, oldest row first.
//! The live price is the last close of the shortest loaded interval unless
//! overridden.

use super::provider::{finalize_candles, DataError, MarketDataProvider};
use super::twelvedata::parse_datetime;
use crate::domain::{Candle, Interval};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
    series: BTreeMap<Interval, Vec<Candle>>,
    price_override: Option<f64>,
}

impl CsvProvider {
    /// Load every `<interval>.csv` present in `dir`.
    pub fn open(dir: &Path) -> Result<Self, DataError> {
        let mut series = BTreeMap::new();
        for interval in Interval::ALL {
            let path = dir.join(format!("{}.csv", interval.as_str()));
            if path.is_file() {
                series.insert(interval, load_candles(&path)?);
            }
        }
        if series.is_empty() {
            return Err(DataError::Csv(format!(
                "no <interval>.csv files found in {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            series,
            price_override: None,
        })
    }

    /// Report `price` as the live price instead of the last close.
    pub fn with_price(mut self, price: f64) -> Self {
        self.price_override = Some(price);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.series.keys().copied()
    }
}

/// Read one CSV file into candles.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, row)| {
            let row = row.map_err(|e| {
                DataError::Csv(format!("{} line {}: {e}", path.display(), idx + 2))
            })?;
            Ok(Candle {
                timestamp: parse_datetime(&row.timestamp)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.unwrap_or(0.0),
            })
        })
        .collect()
}

impl MarketDataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let candles = self.series.get(&interval).cloned().unwrap_or_default();
        finalize_candles(candles, count, symbol, interval)
    }

    fn fetch_price(&self, symbol: &str) -> Result<f64, DataError> {
        if let Some(price) = self.price_override {
            return Ok(price);
        }
        // BTreeMap iterates shortest interval first
        self.series
            .values()
            .next()
            .and_then(|candles| candles.last())
            .map(|c| c.close)
            .filter(|p| p.is_finite())
            .ok_or_else(|| DataError::NoData {
                symbol: symbol.to_string(),
                interval: "price".into(),
            })
    }

    fn is_available(&self) -> bool {
        true
    }
}
