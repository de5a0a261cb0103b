//! Alpha Vantage API response types
//!
//! `GLOBAL_QUOTE` uses numbered, space-separated keys and string values.
//! Throttled calls still answer 200 with a `Note` or `Information` body.

use std::str::FromStr;

use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

/// Base URL for the Alpha Vantage query endpoint
pub const API_BASE: &str = "https://www.alphavantage.co";

/// Body of a `GLOBAL_QUOTE` call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    pub global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note", default)]
    pub note: Option<String>,
    #[serde(rename = "Information", default)]
    pub information: Option<String>,
    #[serde(rename = "Error Message", default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuote {
    #[serde(rename = "01. symbol", default)]
    pub symbol: Option<String>,
    #[serde(rename = "05. price", default)]
    pub price: Option<String>,
    #[serde(rename = "06. volume", default)]
    pub volume: Option<String>,
}

impl GlobalQuoteResponse {
    /// Convert to a tick for `spec`.
    ///
    /// Throttle and error bodies fail the request; an empty or unparseable
    /// quote drops only this symbol.
    pub fn into_tick(self, spec: &AssetSpec) -> PulseResult<Option<RawTick>> {
        if let Some(msg) = self.note.or(self.information) {
            return Err(PulseError::rate_limited(format!("Alpha Vantage: {}", msg)));
        }
        if let Some(msg) = self.error_message {
            return Err(PulseError::api(format!(
                "Alpha Vantage rejected {}: {}",
                spec.symbol, msg
            )));
        }

        let Some(quote) = self.global_quote else {
            warn!("[AlphaVantage] No quote returned for {}", spec.symbol);
            return Ok(None);
        };

        let price = match quote.price.as_deref().map(Decimal::from_str) {
            Some(Ok(p)) if p > Decimal::ZERO => p,
            other => {
                warn!(
                    "[AlphaVantage] Skipping {} with invalid price {:?}",
                    spec.symbol, other
                );
                return Ok(None);
            }
        };

        let volume = quote
            .volume
            .as_deref()
            .and_then(|v| Decimal::from_str(v).ok())
            .filter(|v| !v.is_sign_negative())
            .unwrap_or(Decimal::ZERO);

        Ok(Some(
            RawTick::new(spec.symbol.clone(), spec.name.clone(), spec.asset_type, price)
                .with_volume(volume)
                .with_market_cap(None),
        ))
    }
}
