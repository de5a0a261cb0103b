//! Runtime settings loaded from the environment

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use pulse_core::{ApiProvider, Catalog, ConnectionMethod, Configuration, PulseError, PulseResult};
use tracing::info;

use crate::backoff::Backoff;
use crate::synthetic::DEFAULT_VOLATILITY;

/// Provider credentials
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub alphavantage: Option<String>,
    pub finnhub: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("alphavantage", &self.alphavantage.as_ref().map(|_| "***"))
            .field("finnhub", &self.finnhub.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Timing and retry settings for the transport layer
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Interval between REST polls
    pub poll_interval: Duration,
    /// Cadence of synthetic ticks in WEBSOCKET mode
    pub stream_tick_interval: Duration,
    /// Upper bound on any fetch or subscribe
    pub request_timeout: Duration,
    pub backoff: Backoff,
    /// Consecutive failures tolerated before synthetic fallback kicks in
    pub max_retries: u32,
    pub fallback_to_synthetic: bool,
    pub volatility: f64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            stream_tick_interval: Duration::from_millis(1_000),
            request_timeout: Duration::from_millis(10_000),
            backoff: Backoff::default(),
            max_retries: 5,
            fallback_to_synthetic: true,
            volatility: DEFAULT_VOLATILITY,
        }
    }
}

/// Everything the data layer needs at startup
#[derive(Debug, Clone, Default)]
pub struct PulseSettings {
    pub api_keys: ApiKeys,
    pub initial: Configuration,
    pub transport: TransportSettings,
    pub catalog: Catalog,
}

impl PulseSettings {
    /// Load settings from process environment variables
    pub fn from_env() -> PulseResult<Self> {
        let settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(
            "[Settings] provider={} method={} dummy={} poll={:?}",
            settings.initial.api_provider,
            settings.initial.connection_method,
            settings.initial.use_dummy_data,
            settings.transport.poll_interval
        );
        Ok(settings)
    }

    /// Load settings from a key/value map
    pub fn from_map(vars: &HashMap<String, String>) -> PulseResult<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> PulseResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = TransportSettings::default();

        let api_keys = ApiKeys {
            alphavantage: get("ALPHAVANTAGE_API_KEY"),
            finnhub: get("FINNHUB_API_KEY"),
        };

        let initial = Configuration {
            api_provider: parse_or(get("PULSE_API_PROVIDER"), "PULSE_API_PROVIDER", ApiProvider::Dummy)?,
            connection_method: parse_or(
                get("PULSE_CONNECTION_METHOD"),
                "PULSE_CONNECTION_METHOD",
                ConnectionMethod::Rest,
            )?,
            use_dummy_data: parse_bool(get("PULSE_USE_DUMMY_DATA"), "PULSE_USE_DUMMY_DATA", true)?,
        };

        let base = millis(get("PULSE_BACKOFF_BASE_MS"), "PULSE_BACKOFF_BASE_MS", 1_000)?;
        let max = millis(get("PULSE_BACKOFF_MAX_MS"), "PULSE_BACKOFF_MAX_MS", 30_000)?;
        let jitter = parse_bool(get("PULSE_BACKOFF_JITTER"), "PULSE_BACKOFF_JITTER", true)?;

        let transport = TransportSettings {
            poll_interval: millis(get("PULSE_POLL_INTERVAL_MS"), "PULSE_POLL_INTERVAL_MS", 5_000)?,
            stream_tick_interval: millis(get("PULSE_STREAM_TICK_MS"), "PULSE_STREAM_TICK_MS", 1_000)?,
            request_timeout: millis(
                get("PULSE_REQUEST_TIMEOUT_MS"),
                "PULSE_REQUEST_TIMEOUT_MS",
                10_000,
            )?,
            backoff: Backoff::exponential(base, max, jitter),
            max_retries: parse_or(get("PULSE_MAX_RETRIES"), "PULSE_MAX_RETRIES", defaults.max_retries)?,
            fallback_to_synthetic: parse_bool(
                get("PULSE_FALLBACK_TO_SYNTHETIC"),
                "PULSE_FALLBACK_TO_SYNTHETIC",
                defaults.fallback_to_synthetic,
            )?,
            volatility: parse_or(get("PULSE_VOLATILITY"), "PULSE_VOLATILITY", defaults.volatility)?,
        };

        if !(transport.volatility.is_finite() && transport.volatility >= 0.0) {
            return Err(PulseError::config(format!(
                "PULSE_VOLATILITY must be a non-negative number, got {}",
                transport.volatility
            )));
        }

        Ok(Self {
            api_keys,
            initial,
            transport,
            catalog: Catalog::default(),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> PulseResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| PulseError::config(format!("Invalid {}={}: {}", key, raw, e))),
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> PulseResult<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(PulseError::config(format!(
            "Invalid {}={}: expected true or false",
            key, other
        ))),
    }
}

fn millis(value: Option<String>, key: &str, default: u64) -> PulseResult<Duration> {
    let ms: u64 = parse_or(value, key, default)?;
    if ms == 0 {
        return Err(PulseError::config(format!("{} must be greater than zero", key)));
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = PulseSettings::from_map(&HashMap::new()).unwrap();

        assert_eq!(settings.initial, Configuration::default());
        assert_eq!(settings.transport.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.transport.max_retries, 5);
        assert!(settings.transport.fallback_to_synthetic);
        assert!(settings.api_keys.finnhub.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let settings = PulseSettings::from_map(&vars(&[
            ("PULSE_API_PROVIDER", "binance"),
            ("PULSE_CONNECTION_METHOD", "websocket"),
            ("PULSE_USE_DUMMY_DATA", "false"),
            ("PULSE_POLL_INTERVAL_MS", "2500"),
            ("PULSE_BACKOFF_BASE_MS", "200"),
            ("PULSE_BACKOFF_MAX_MS", "800"),
            ("PULSE_BACKOFF_JITTER", "off"),
            ("FINNHUB_API_KEY", " key "),
        ]))
        .unwrap();

        assert_eq!(settings.initial.api_provider, ApiProvider::Binance);
        assert_eq!(settings.initial.connection_method, ConnectionMethod::WebSocket);
        assert!(!settings.initial.use_dummy_data);
        assert_eq!(settings.transport.poll_interval, Duration::from_millis(2500));
        assert_eq!(settings.transport.backoff.delay(0), Duration::from_millis(200));
        assert_eq!(settings.transport.backoff.delay(5), Duration::from_millis(800));
        assert_eq!(settings.api_keys.finnhub.as_deref(), Some("key"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for (key, value) in [
            ("PULSE_API_PROVIDER", "kraken"),
            ("PULSE_POLL_INTERVAL_MS", "0"),
            ("PULSE_POLL_INTERVAL_MS", "soon"),
            ("PULSE_USE_DUMMY_DATA", "maybe"),
            ("PULSE_VOLATILITY", "-1"),
        ] {
            let result = PulseSettings::from_map(&vars(&[(key, value)]));
            assert!(matches!(result, Err(PulseError::Config(_))), "{}={}", key, value);
        }
    }

    #[test]
    fn test_api_keys_are_redacted_in_debug() {
        let keys = ApiKeys {
            alphavantage: Some("secret".to_string()),
            finnhub: None,
        };
        assert!(!format!("{:?}", keys).contains("secret"));
    }
}
