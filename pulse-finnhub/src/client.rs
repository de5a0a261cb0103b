//! Finnhub REST client

use std::time::Duration;

use futures_util::future::join_all;
use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::types::{QuoteResponse, REST_API_BASE};

/// Finnhub quote client
#[derive(Clone)]
pub struct FinnhubClient {
    client: Client,
    base_url: String,
    api_key: String,
    assets: Vec<AssetSpec>,
}

impl FinnhubClient {
    pub fn new(
        api_key: impl Into<String>,
        assets: Vec<AssetSpec>,
        timeout: Duration,
    ) -> PulseResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PulseError::config("Finnhub requires FINNHUB_API_KEY"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: REST_API_BASE.to_string(),
            api_key,
            assets,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn assets(&self) -> &[AssetSpec] {
        &self.assets
    }

    /// Fetch a quote for every tracked stock, failing only if none succeed
    #[instrument(skip(self))]
    pub async fn fetch_quotes(&self) -> PulseResult<Vec<RawTick>> {
        let results = join_all(self.assets.iter().map(|spec| self.fetch_quote(spec))).await;

        let mut ticks = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some(tick)) => ticks.push(tick),
                Ok(None) => {}
                Err(e) => {
                    warn!("[Finnhub] Quote failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if ticks.is_empty() => Err(e),
            _ => Ok(ticks),
        }
    }

    #[instrument(skip(self, spec), fields(symbol = %spec.symbol))]
    pub async fn fetch_quote(&self, spec: &AssetSpec) -> PulseResult<Option<RawTick>> {
        let url = format!("{}/quote", self.base_url);

        debug!("Fetching Finnhub quote for {}", spec.symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", spec.symbol.as_str()), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::timeout(format!("Finnhub quote {}: {}", spec.symbol, e))
                } else {
                    PulseError::network(format!("Failed to fetch quote {}: {}", spec.symbol, e))
                }
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(PulseError::rate_limited("Finnhub rate limit exceeded"));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PulseError::api("Finnhub rejected the API key"));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(PulseError::api(format!(
                    "Finnhub API error ({}): {}",
                    status, body
                )));
            }
            _ => {}
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| PulseError::parse(format!("Failed to parse quote {}: {}", spec.symbol, e)))?;

        Ok(quote.into_tick(spec))
    }
}
