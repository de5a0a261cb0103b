//! Binance REST client
//!
//! Fetches 24hr ticker statistics for every tracked pair in one request.

use std::time::Duration;

use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::types::{pair_for, parse_tickers, REST_API_BASE};

/// Binance spot REST client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    assets: Vec<AssetSpec>,
}

impl BinanceClient {
    /// Create a new client tracking `assets`
    pub fn new(assets: Vec<AssetSpec>, timeout: Duration) -> PulseResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: REST_API_BASE.to_string(),
            assets,
        })
    }

    /// Point the client at another host (test servers, regional mirrors)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn assets(&self) -> &[AssetSpec] {
        &self.assets
    }

    /// Fetch the latest ticker for every tracked pair
    #[instrument(skip(self))]
    pub async fn fetch_tickers(&self) -> PulseResult<Vec<RawTick>> {
        if self.assets.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<String> = self.assets.iter().map(|a| pair_for(&a.symbol)).collect();
        let symbols = serde_json::to_string(&pairs)
            .map_err(|e| PulseError::internal(format!("Failed to encode pairs: {}", e)))?;
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);

        debug!("Fetching Binance tickers for {} pairs", pairs.len());

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", symbols)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::timeout(format!("Binance ticker request: {}", e))
                } else {
                    PulseError::network(format!("Failed to fetch Binance tickers: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(PulseError::rate_limited(format!(
                "Binance rejected request ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::api(format!(
                "Binance API error ({}): {}",
                status, body
            )));
        }

        let records: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| PulseError::parse(format!("Failed to parse Binance tickers: {}", e)))?;

        Ok(parse_tickers(records, &self.assets))
    }
}
