//! Signal configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Secrets are never stored in the file: the config names the environment
//! variables that hold them.

use crate::domain::Interval;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingSecret(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

/// Top-level configuration. Read-only after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalConfig {
    pub symbol: String,
    pub fast_interval: Interval,
    pub slow_interval: Interval,
    /// Candles requested per timeframe.
    pub candle_count: usize,
    pub indicators: IndicatorConfig,
    pub thresholds: ThresholdConfig,
    pub risk: RiskConfig,
    pub provider: ProviderConfig,
    pub bot: BotConfig,
    pub scheduler: SchedulerConfig,
    pub health: HealthConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            symbol: "GBP/USD".into(),
            fast_interval: Interval::Min15,
            slow_interval: Interval::Hour1,
            candle_count: 100,
            indicators: IndicatorConfig::default(),
            thresholds: ThresholdConfig::default(),
            risk: RiskConfig::default(),
            provider: ProviderConfig::default(),
            bot: BotConfig::default(),
            scheduler: SchedulerConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    pub bollinger_stddev: f64,
    /// Fewer candles than this on either timeframe means "not enough data".
    pub min_candles: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 12,
            ema_slow: 26,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 10,
            bollinger_period: 20,
            bollinger_stddev: 2.0,
            min_candles: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Minimum confidence (percent, exclusive) for a BUY or SELL.
    pub confidence: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            confidence: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Target distance as a multiple of the stop distance.
    pub risk_reward: f64,
    /// Stop distance as a multiple of the fast-timeframe ATR.
    pub atr_sl_multiplier: f64,
}

impl RiskConfig {
    /// Target distance as a multiple of ATR.
    pub fn atr_tp_multiplier(&self) -> f64 {
        self.atr_sl_multiplier * self.risk_reward
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_reward: 1.5,
            atr_sl_multiplier: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub breaker_cooldown_secs: u64,
}

impl ProviderConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        read_secret(&self.api_key_env)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twelvedata.com".into(),
            api_key_env: "TWELVEDATA_API_KEY".into(),
            timeout_secs: 10,
            breaker_cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    pub token_env: String,
    /// Shown to users who need an access code.
    pub admin_contact: String,
    /// Days a redeemed code grants access for.
    pub access_days: i64,
    /// Days a generated code stays redeemable.
    pub code_days: i64,
    /// Command names (without the slash) that claim or open the admin panel.
    pub admin_commands: Vec<String>,
    pub poll_timeout_secs: u64,
    /// Threads handling incoming messages; each user is pinned to one.
    pub dispatch_workers: usize,
}

impl BotConfig {
    /// Read the bot token from the configured environment variable.
    pub fn token(&self) -> Result<String, ConfigError> {
        read_secret(&self.token_env)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token_env: "TELEGRAM_TOKEN".into(),
            admin_contact: "@admin".into(),
            access_days: 30,
            code_days: 30,
            admin_commands: vec!["admin".into()],
            poll_timeout_secs: 30,
            dispatch_workers: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub error_backoff_secs: u64,
    /// IANA zone the session hours are read in.
    pub timezone: Tz,
    pub sessions: Vec<SessionWindow>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 900,
            error_backoff_secs: 60,
            timezone: chrono_tz::Europe::London,
            sessions: vec![
                SessionWindow::new("LONDON", 7, 16),
                SessionWindow::new("NEW_YORK", 12, 21),
            ],
        }
    }
}

/// A trading session as a local hour window `[start_hour, end_hour)` in
/// the scheduler's timezone.
///
/// `start_hour > end_hour` wraps past midnight (e.g. 23 to 8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionWindow {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl SessionWindow {
    pub fn new(name: impl Into<String>, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name: name.into(),
            start_hour,
            end_hour,
        }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5000,
        }
    }
}

fn read_secret(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingSecret(var.to_string())),
    }
}

impl SignalConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML (used by `config init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let ind = &self.indicators;

        if self.symbol.trim().is_empty() {
            return invalid("symbol must not be empty".into());
        }
        for (name, period) in [
            ("ema_fast", ind.ema_fast),
            ("ema_slow", ind.ema_slow),
            ("rsi_period", ind.rsi_period),
            ("macd_fast", ind.macd_fast),
            ("macd_slow", ind.macd_slow),
            ("macd_signal", ind.macd_signal),
            ("atr_period", ind.atr_period),
            ("bollinger_period", ind.bollinger_period),
            ("min_candles", ind.min_candles),
        ] {
            if period == 0 {
                return invalid(format!("indicators.{name} must be >= 1"));
            }
        }
        if ind.ema_fast >= ind.ema_slow {
            return invalid(format!(
                "indicators.ema_fast ({}) must be shorter than ema_slow ({})",
                ind.ema_fast, ind.ema_slow
            ));
        }
        if ind.macd_fast >= ind.macd_slow {
            return invalid(format!(
                "indicators.macd_fast ({}) must be shorter than macd_slow ({})",
                ind.macd_fast, ind.macd_slow
            ));
        }
        if !(ind.bollinger_stddev > 0.0) {
            return invalid("indicators.bollinger_stddev must be positive".into());
        }
        if self.candle_count < ind.min_candles {
            return invalid(format!(
                "candle_count ({}) must be >= indicators.min_candles ({})",
                self.candle_count, ind.min_candles
            ));
        }

        let th = &self.thresholds;
        if !(0.0 <= th.rsi_oversold && th.rsi_oversold < th.rsi_overbought && th.rsi_overbought <= 100.0) {
            return invalid(format!(
                "thresholds require 0 <= rsi_oversold ({}) < rsi_overbought ({}) <= 100",
                th.rsi_oversold, th.rsi_overbought
            ));
        }
        if !(0.0..100.0).contains(&th.confidence) {
            return invalid(format!("thresholds.confidence ({}) must be in [0, 100)", th.confidence));
        }

        if !(self.risk.risk_reward > 0.0) || !(self.risk.atr_sl_multiplier > 0.0) {
            return invalid("risk multipliers must be positive".into());
        }

        if self.provider.timeout_secs == 0 {
            return invalid("provider.timeout_secs must be > 0".into());
        }
        if self.bot.access_days <= 0 || self.bot.code_days <= 0 {
            return invalid("bot.access_days and bot.code_days must be positive".into());
        }
        if self.bot.dispatch_workers == 0 {
            return invalid("bot.dispatch_workers must be >= 1".into());
        }

        if self.scheduler.interval_secs == 0 {
            return invalid("scheduler.interval_secs must be > 0".into());
        }
        for session in &self.scheduler.sessions {
            if session.start_hour >= 24 || session.end_hour >= 24 {
                return invalid(format!("session {} hours must be < 24", session.name));
            }
        }

        Ok(())
    }

    /// BLAKE3 hex digest of the canonical JSON serialization.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = SignalConfig::from_toml("").unwrap();
        assert_eq!(config, SignalConfig::default());
        assert_eq!(config.fast_interval, Interval::Min15);
        assert_eq!(config.indicators.min_candles, 50);
        assert!((config.risk.atr_tp_multiplier() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn partial_override() {
        let config = SignalConfig::from_toml(
            r#"
            symbol = "EUR/USD"
            slow_interval = "4h"

            [thresholds]
            confidence = 40.0

            [[scheduler.sessions]]
            name = "ASIA"
            start_hour = 23
            end_hour = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.symbol, "EUR/USD");
        assert_eq!(config.slow_interval, Interval::Hour4);
        assert_eq!(config.thresholds.confidence, 40.0);
        assert_eq!(config.thresholds.rsi_overbought, 70.0);
        assert_eq!(config.scheduler.sessions.len(), 1);
        assert_eq!(config.scheduler.interval_secs, 900);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = SignalConfig::from_toml("symbl = \"GBP/USD\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_interval_rejected() {
        assert!(matches!(
            SignalConfig::from_toml("fast_interval = \"7min\"").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn inverted_ema_rejected() {
        let err = SignalConfig::from_toml("[indicators]\nema_fast = 30\nema_slow = 26").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("ema_fast")));
    }

    #[test]
    fn invalid_thresholds_rejected() {
        let mut config = SignalConfig::default();
        config.thresholds.rsi_oversold = 80.0;
        assert!(config.validate().is_err());

        let mut config = SignalConfig::default();
        config.thresholds.confidence = 100.0;
        assert!(config.validate().is_err());

        let mut config = SignalConfig::default();
        config.candle_count = 20;
        assert!(config.validate().is_err());

        let mut config = SignalConfig::default();
        config.scheduler.sessions.push(SessionWindow::new("BAD", 7, 24));
        assert!(config.validate().is_err());

        let mut config = SignalConfig::default();
        config.bot.dispatch_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = SignalConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(SignalConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = SignalConfig::default();
        let mut b = SignalConfig::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
        b.risk.risk_reward = 2.0;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn scheduler_timezone() {
        assert_eq!(SchedulerConfig::default().timezone, chrono_tz::Europe::London);

        let config = SignalConfig::from_toml("[scheduler]\ntimezone = \"America/New_York\"").unwrap();
        assert_eq!(config.scheduler.timezone, chrono_tz::America::New_York);

        assert!(matches!(
            SignalConfig::from_toml("[scheduler]\ntimezone = \"Mars/Olympus\"").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn session_windows() {
        let london = SessionWindow::new("LONDON", 7, 16);
        assert!(london.contains_hour(7));
        assert!(london.contains_hour(15));
        assert!(!london.contains_hour(16));
        assert!(!london.contains_hour(3));

        let asia = SessionWindow::new("ASIA", 23, 8);
        assert!(asia.contains_hour(23));
        assert!(asia.contains_hour(0));
        assert!(asia.contains_hour(7));
        assert!(!asia.contains_hour(8));
        assert!(!asia.contains_hour(12));
    }

    #[test]
    fn missing_secret_is_reported() {
        let provider = ProviderConfig {
            api_key_env: "FXSIGNAL_TEST_UNSET_API_KEY".into(),
            ..ProviderConfig::default()
        };
        assert!(matches!(
            provider.api_key(),
            Err(ConfigError::MissingSecret(var)) if var == "FXSIGNAL_TEST_UNSET_API_KEY"
        ));
    }
}
