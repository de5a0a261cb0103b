//! Provider selection and transport configuration

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AssetType, PulseError, PulseResult};

/// Upstream quote providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiProvider {
    /// Alpha Vantage - stock quotes over REST
    #[serde(rename = "ALPHAVANTAGE")]
    AlphaVantage,
    /// Finnhub - stock quotes over REST and trade stream
    #[serde(rename = "FINNHUB")]
    Finnhub,
    /// Binance - crypto tickers over REST and WebSocket
    #[serde(rename = "BINANCE")]
    Binance,
    /// CoinGecko - crypto markets over REST
    #[serde(rename = "COINGECKO")]
    CoinGecko,
    /// Synthetic data only
    #[serde(rename = "DUMMY")]
    Dummy,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 5] = [
        ApiProvider::AlphaVantage,
        ApiProvider::Finnhub,
        ApiProvider::Binance,
        ApiProvider::CoinGecko,
        ApiProvider::Dummy,
    ];

    /// Get the full display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ApiProvider::AlphaVantage => "Alpha Vantage",
            ApiProvider::Finnhub => "Finnhub",
            ApiProvider::Binance => "Binance",
            ApiProvider::CoinGecko => "CoinGecko",
            ApiProvider::Dummy => "Dummy",
        }
    }

    /// Asset class served live by this provider, `None` for the dummy marker
    pub fn asset_type(&self) -> Option<AssetType> {
        match self {
            ApiProvider::AlphaVantage | ApiProvider::Finnhub => Some(AssetType::Stock),
            ApiProvider::Binance | ApiProvider::CoinGecko => Some(AssetType::Crypto),
            ApiProvider::Dummy => None,
        }
    }

    pub fn supports_streaming(&self) -> bool {
        matches!(
            self,
            ApiProvider::Finnhub | ApiProvider::Binance | ApiProvider::Dummy
        )
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, ApiProvider::Dummy)
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "alphavantage" | "av" => Ok(ApiProvider::AlphaVantage),
            "finnhub" => Ok(ApiProvider::Finnhub),
            "binance" => Ok(ApiProvider::Binance),
            "coingecko" | "gecko" => Ok(ApiProvider::CoinGecko),
            "dummy" | "synthetic" => Ok(ApiProvider::Dummy),
            _ => Err(format!("Unknown API provider: {}", s)),
        }
    }
}

/// How live data is pulled from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionMethod {
    Rest,
    WebSocket,
}

impl fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMethod::Rest => write!(f, "REST"),
            ConnectionMethod::WebSocket => write!(f, "WebSocket"),
        }
    }
}

impl std::str::FromStr for ConnectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "rest" | "poll" | "polling" => Ok(ConnectionMethod::Rest),
            "websocket" | "ws" | "stream" => Ok(ConnectionMethod::WebSocket),
            _ => Err(format!("Unknown connection method: {}", s)),
        }
    }
}

/// User-facing data source configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub api_provider: ApiProvider,
    pub connection_method: ConnectionMethod,
    /// When set, provider and method are advisory only
    pub use_dummy_data: bool,
}

impl Configuration {
    /// Whether every asset class is served by the synthetic generator
    pub fn is_synthetic_only(&self) -> bool {
        self.use_dummy_data || self.api_provider.is_dummy()
    }

    /// Reject combinations no transport can honor.
    ///
    /// Checked even in dummy mode so that switching dummy data off later
    /// cannot land on an invalid pair.
    pub fn validate(&self) -> PulseResult<()> {
        if self.connection_method == ConnectionMethod::WebSocket
            && !self.api_provider.supports_streaming()
        {
            return Err(PulseError::config(format!(
                "{} does not offer a streaming API; use REST polling instead",
                self.api_provider
            )));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_provider: ApiProvider::Dummy,
            connection_method: ConnectionMethod::Rest,
            use_dummy_data: true,
        }
    }
}
