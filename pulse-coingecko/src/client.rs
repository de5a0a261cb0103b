//! CoinGecko REST client

use std::time::Duration;

use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::types::{ids_for, parse_markets, API_BASE, VS_CURRENCY};

/// CoinGecko markets client
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    assets: Vec<AssetSpec>,
}

impl CoinGeckoClient {
    pub fn new(assets: Vec<AssetSpec>, timeout: Duration) -> PulseResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            assets,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch market data for every tracked coin in one request
    #[instrument(skip(self))]
    pub async fn fetch_markets(&self) -> PulseResult<Vec<RawTick>> {
        if self.assets.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ids_for(&self.assets).join(",");
        let url = format!("{}/coins/markets", self.base_url);

        debug!("Fetching CoinGecko markets: {}", ids);

        let response = self
            .client
            .get(&url)
            .query(&[("vs_currency", VS_CURRENCY), ("ids", ids.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::timeout(format!("CoinGecko markets request: {}", e))
                } else {
                    PulseError::network(format!("Failed to fetch CoinGecko markets: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PulseError::rate_limited("CoinGecko rate limit exceeded"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::api(format!(
                "CoinGecko API error ({}): {}",
                status, body
            )));
        }

        let records: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PulseError::parse(format!("Failed to parse CoinGecko markets: {}", e)))?;

        Ok(parse_markets(records, &self.assets))
    }
}
