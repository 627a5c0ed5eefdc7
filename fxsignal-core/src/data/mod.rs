//! Market data providers.

pub mod circuit_breaker;
pub mod csv_provider;
pub mod provider;
pub mod static_provider;
pub mod twelvedata;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use csv_provider::CsvProvider;
pub use provider::{finalize_candles, DataError, MarketDataProvider};
pub use static_provider::StaticProvider;
pub use twelvedata::TwelveDataProvider;
