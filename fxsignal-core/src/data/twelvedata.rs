//! Twelve Data market data provider.
//!
//! Fetches intraday candles from `/time_series` and the live quote from
//! `/price`. Handles error envelopes, retries with exponential backoff, and
//! the circuit breaker. The API key travels as a query parameter, so request
//! errors are stripped of their URL before being surfaced.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{finalize_candles, DataError, MarketDataProvider};
use crate::config::ProviderConfig;
use crate::domain::{Candle, Interval};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound the API accepts for `outputsize`.
pub const MAX_OUTPUT_SIZE: usize = 5000;

/// Error envelope: `{"code": 400, "message": "...", "status": "error"}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<String>,
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    values: Option<Vec<TimeSeriesValue>>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Option<String>,
}

/// Twelve Data REST provider.
pub struct TwelveDataProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl TwelveDataProvider {
    pub fn new(
        config: &ProviderConfig,
        api_key: String,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("fxsignal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_secs: config.timeout_secs,
            circuit_breaker,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Build a provider with its own breaker from config and the env API key.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, DataError> {
        let api_key = config
            .api_key()
            .map_err(|e| DataError::AuthenticationRequired(e.to_string()))?;
        let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(
            config.breaker_cooldown_secs,
        )));
        Self::new(config, api_key, breaker)
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    /// GET `path` with `params` plus the API key, with retry and breaker logic.
    fn get_with_retry(&self, path: &str, params: &[(&str, String)]) -> Result<String, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = format!("{}/{path}", self.base_url);
        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("apikey", self.api_key.as_str()));

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(&url).query(&query).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::RateLimited(format!("HTTP {status}")));
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(
                            "Twelve Data rejected the API key".into(),
                        ));
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {path}")));
                        continue;
                    }

                    return resp.text().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to read {path} body: {}",
                            e.without_url()
                        ))
                    });
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    let e = e.without_url();
                    if e.is_timeout() {
                        last_error = Some(DataError::Timeout {
                            secs: self.timeout_secs,
                        });
                        continue;
                    }
                    if e.is_connect() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    /// Parse a body, honoring the API's in-band error envelope, and record
    /// the outcome on the breaker.
    fn decode<T: DeserializeOwned>(&self, symbol: &str, body: &str) -> Result<T, DataError> {
        let result = decode_body(symbol, body);
        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(DataError::AuthenticationRequired(_)) if is_forbidden(body) => {
                self.circuit_breaker.trip()
            }
            Err(_) => self.circuit_breaker.record_failure(),
        }
        result
    }
}

fn is_forbidden(body: &str) -> bool {
    serde_json::from_str::<Envelope>(body)
        .map(|env| env.code == Some(403))
        .unwrap_or(false)
}

/// Decode a response body into `T`, mapping `"status": "error"` envelopes.
fn decode_body<T: DeserializeOwned>(symbol: &str, body: &str) -> Result<T, DataError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("invalid JSON: {e}")))?;

    if envelope.status.as_deref() == Some("error") {
        let message = envelope.message.unwrap_or_else(|| "unknown error".into());
        return Err(match envelope.code {
            Some(400) | Some(404) => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(401) | Some(403) => DataError::AuthenticationRequired(message),
            Some(429) => DataError::RateLimited(message),
            _ => DataError::ResponseFormatChanged(message),
        });
    }

    serde_json::from_str(body).map_err(|e| DataError::ResponseFormatChanged(e.to_string()))
}

fn parse_number(field: &str, raw: &str) -> Result<f64, DataError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DataError::ResponseFormatChanged(format!("{field} is not a number: {raw:?}")))
}

/// Parse `%Y-%m-%d %H:%M:%S` or, for daily bars, `%Y-%m-%d`.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, DataError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| DataError::ResponseFormatChanged(format!("invalid datetime: {raw:?}")))
}

/// Parse a `/time_series` body into candles, oldest first.
pub fn parse_time_series(
    symbol: &str,
    interval: Interval,
    count: usize,
    body: &str,
) -> Result<Vec<Candle>, DataError> {
    let resp: TimeSeriesResponse = decode_body(symbol, body)?;
    candles_from_response(symbol, interval, count, resp)
}

fn candles_from_response(
    symbol: &str,
    interval: Interval,
    count: usize,
    resp: TimeSeriesResponse,
) -> Result<Vec<Candle>, DataError> {
    let values = resp
        .values
        .ok_or_else(|| DataError::ResponseFormatChanged("missing values array".into()))?;

    // The API returns newest first
    let candles = values
        .into_iter()
        .rev()
        .map(|v| {
            Ok(Candle {
                timestamp: parse_datetime(&v.datetime)?,
                open: parse_number("open", &v.open)?,
                high: parse_number("high", &v.high)?,
                low: parse_number("low", &v.low)?,
                close: parse_number("close", &v.close)?,
                volume: match v.volume.as_deref() {
                    Some(raw) => parse_number("volume", raw)?,
                    None => 0.0,
                },
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    finalize_candles(candles, count, symbol, interval)
}

/// Parse a `/price` body.
pub fn parse_price(symbol: &str, body: &str) -> Result<f64, DataError> {
    let resp: PriceResponse = decode_body(symbol, body)?;
    price_from_response(resp)
}

fn price_from_response(resp: PriceResponse) -> Result<f64, DataError> {
    let raw = resp
        .price
        .ok_or_else(|| DataError::ResponseFormatChanged("missing price field".into()))?;
    let price = parse_number("price", &raw)?;
    if !price.is_finite() || price <= 0.0 {
        return Err(DataError::ResponseFormatChanged(format!(
            "implausible price: {raw}"
        )));
    }
    Ok(price)
}

impl MarketDataProvider for TwelveDataProvider {
    fn name(&self) -> &str {
        "twelvedata"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        count: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let outputsize = count.clamp(1, MAX_OUTPUT_SIZE);
        let body = self.get_with_retry(
            "time_series",
            &[
                ("symbol", symbol.to_string()),
                ("interval", interval.as_str().to_string()),
                ("outputsize", outputsize.to_string()),
            ],
        )?;
        let resp: TimeSeriesResponse = self.decode(symbol, &body)?;
        candles_from_response(symbol, interval, count, resp)
    }

    fn fetch_price(&self, symbol: &str) -> Result<f64, DataError> {
        let body = self.get_with_retry("price", &[("symbol", symbol.to_string())])?;
        let resp: PriceResponse = self.decode(symbol, &body)?;
        price_from_response(resp)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
