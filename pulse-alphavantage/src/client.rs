//! Alpha Vantage REST client
//!
//! `GLOBAL_QUOTE` answers one symbol per call, so a fetch fans out one
//! request per tracked stock and keeps whatever succeeded.

use std::time::Duration;

use futures_util::future::join_all;
use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::types::{GlobalQuoteResponse, API_BASE};

/// Alpha Vantage quote client
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
    assets: Vec<AssetSpec>,
}

impl AlphaVantageClient {
    pub fn new(
        api_key: impl Into<String>,
        assets: Vec<AssetSpec>,
        timeout: Duration,
    ) -> PulseResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PulseError::config("Alpha Vantage requires ALPHAVANTAGE_API_KEY"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            api_key,
            assets,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch a quote for every tracked stock.
    ///
    /// Fails only when no symbol could be fetched.
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
                    warn!("[AlphaVantage] Quote failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if ticks.is_empty() => Err(e),
            _ => Ok(ticks),
        }
    }

    /// Fetch a single symbol's quote
    #[instrument(skip(self, spec), fields(symbol = %spec.symbol))]
    pub async fn fetch_quote(&self, spec: &AssetSpec) -> PulseResult<Option<RawTick>> {
        let url = format!("{}/query", self.base_url);

        debug!("Fetching Alpha Vantage quote for {}", spec.symbol);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", spec.symbol.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::timeout(format!("Alpha Vantage quote {}: {}", spec.symbol, e))
                } else {
                    PulseError::network(format!("Failed to fetch quote {}: {}", spec.symbol, e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PulseError::rate_limited("Alpha Vantage rate limit exceeded"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::api(format!(
                "Alpha Vantage API error ({}): {}",
                status, body
            )));
        }

        let body: GlobalQuoteResponse = response
            .json()
            .await
            .map_err(|e| PulseError::parse(format!("Failed to parse quote {}: {}", spec.symbol, e)))?;

        body.into_tick(spec)
    }
}
