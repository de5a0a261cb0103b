//! Provider adapter abstraction
//!
//! [`QuoteFeed`] is the seam between the transport layer and the provider
//! crates. [`ProviderAdapter`] wires the real clients in;
//! [`FeedRegistry`] decides which adapter serves a provider so tests can
//! substitute scripted feeds.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use pulse_alphavantage::AlphaVantageClient;
use pulse_binance::{BinanceClient, BinanceWebSocket};
use pulse_coingecko::CoinGeckoClient;
use pulse_core::{ApiProvider, AssetType, PulseError, PulseResult, RawTick};
use pulse_finnhub::{FinnhubClient, FinnhubWebSocket};

use crate::settings::PulseSettings;

/// Live stream of tick batches. Dropping it unsubscribes.
pub type TickStream = BoxStream<'static, PulseResult<Vec<RawTick>>>;

/// A source of normalized ticks for one provider
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    fn provider(&self) -> ApiProvider;

    fn asset_type(&self) -> AssetType;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// One round of quotes for every tracked symbol
    async fn fetch_once(&self) -> PulseResult<Vec<RawTick>>;

    /// Open a live stream. Resolves once the subscription is acknowledged.
    async fn subscribe(&self) -> PulseResult<TickStream> {
        Err(PulseError::unsupported(format!(
            "{} has no streaming API",
            self.provider()
        )))
    }
}

/// Resolves the adapter serving a provider
pub trait FeedRegistry: Send + Sync {
    /// Build the adapter for `provider`. Must not touch the network.
    fn feed_for(&self, provider: ApiProvider) -> PulseResult<Arc<dyn QuoteFeed>>;
}

/// Adapters for the real upstream providers
pub enum ProviderAdapter {
    AlphaVantage(AlphaVantageClient),
    Finnhub {
        client: FinnhubClient,
        stream: FinnhubWebSocket,
    },
    Binance {
        client: BinanceClient,
        stream: BinanceWebSocket,
    },
    CoinGecko(CoinGeckoClient),
}

impl ProviderAdapter {
    pub fn build(provider: ApiProvider, settings: &PulseSettings) -> PulseResult<Self> {
        let timeout = settings.transport.request_timeout;
        let stocks = settings.catalog.stocks.clone();
        let crypto = settings.catalog.crypto.clone();

        let adapter = match provider {
            ApiProvider::AlphaVantage => {
                let key = settings.api_keys.alphavantage.clone().unwrap_or_default();
                Self::AlphaVantage(AlphaVantageClient::new(key, stocks, timeout)?)
            }
            ApiProvider::Finnhub => {
                let key = settings.api_keys.finnhub.clone().unwrap_or_default();
                let client = FinnhubClient::new(key.clone(), stocks.clone(), timeout)?;
                Self::Finnhub {
                    client,
                    stream: FinnhubWebSocket::new(key, stocks),
                }
            }
            ApiProvider::Binance => Self::Binance {
                client: BinanceClient::new(crypto.clone(), timeout)?,
                stream: BinanceWebSocket::new(crypto),
            },
            ApiProvider::CoinGecko => Self::CoinGecko(CoinGeckoClient::new(crypto, timeout)?),
            ApiProvider::Dummy => {
                return Err(PulseError::config(
                    "The dummy provider is served by the synthetic generator",
                ))
            }
        };

        Ok(adapter)
    }
}

#[async_trait]
impl QuoteFeed for ProviderAdapter {
    fn provider(&self) -> ApiProvider {
        match self {
            Self::AlphaVantage(_) => ApiProvider::AlphaVantage,
            Self::Finnhub { .. } => ApiProvider::Finnhub,
            Self::Binance { .. } => ApiProvider::Binance,
            Self::CoinGecko(_) => ApiProvider::CoinGecko,
        }
    }

    fn asset_type(&self) -> AssetType {
        match self {
            Self::AlphaVantage(_) | Self::Finnhub { .. } => AssetType::Stock,
            Self::Binance { .. } | Self::CoinGecko(_) => AssetType::Crypto,
        }
    }

    fn supports_streaming(&self) -> bool {
        matches!(self, Self::Finnhub { .. } | Self::Binance { .. })
    }

    async fn fetch_once(&self) -> PulseResult<Vec<RawTick>> {
        match self {
            Self::AlphaVantage(client) => client.fetch_quotes().await,
            Self::Finnhub { client, .. } => client.fetch_quotes().await,
            Self::Binance { client, .. } => client.fetch_tickers().await,
            Self::CoinGecko(client) => client.fetch_markets().await,
        }
    }

    async fn subscribe(&self) -> PulseResult<TickStream> {
        match self {
            Self::Finnhub { stream, .. } => stream.subscribe().await,
            Self::Binance { stream, .. } => stream.subscribe().await,
            _ => Err(PulseError::unsupported(format!(
                "{} has no streaming API",
                self.provider()
            ))),
        }
    }
}

/// Registry backed by the real provider crates
pub struct ProviderRegistry {
    settings: PulseSettings,
}

impl ProviderRegistry {
    pub fn new(settings: PulseSettings) -> Self {
        Self { settings }
    }
}

impl FeedRegistry for ProviderRegistry {
    fn feed_for(&self, provider: ApiProvider) -> PulseResult<Arc<dyn QuoteFeed>> {
        let adapter = ProviderAdapter::build(provider, &self.settings)?;
        Ok(Arc::new(adapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ApiKeys;

    #[test]
    fn test_keyless_providers_build() {
        let registry = ProviderRegistry::new(PulseSettings::default());

        let binance = registry.feed_for(ApiProvider::Binance).unwrap();
        assert_eq!(binance.asset_type(), AssetType::Crypto);
        assert!(binance.supports_streaming());

        let gecko = registry.feed_for(ApiProvider::CoinGecko).unwrap();
        assert!(!gecko.supports_streaming());
    }

    #[test]
    fn test_missing_keys_are_config_errors() {
        let registry = ProviderRegistry::new(PulseSettings::default());

        for provider in [ApiProvider::AlphaVantage, ApiProvider::Finnhub, ApiProvider::Dummy] {
            assert!(matches!(
                registry.feed_for(provider),
                Err(PulseError::Config(_))
            ));
        }
    }

    #[test]
    fn test_keyed_provider_builds() {
        let settings = PulseSettings {
            api_keys: ApiKeys {
                alphavantage: None,
                finnhub: Some("token".to_string()),
            },
            ..PulseSettings::default()
        };
        let feed = ProviderRegistry::new(settings)
            .feed_for(ApiProvider::Finnhub)
            .unwrap();

        assert_eq!(feed.provider(), ApiProvider::Finnhub);
        assert_eq!(feed.asset_type(), AssetType::Stock);
    }

    #[tokio::test]
    async fn test_rest_only_provider_rejects_subscribe() {
        let feed = ProviderRegistry::new(PulseSettings::default())
            .feed_for(ApiProvider::CoinGecko)
            .unwrap();

        assert!(matches!(
            feed.subscribe().await,
            Err(PulseError::Unsupported(_))
        ));
    }
}
