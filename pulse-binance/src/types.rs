//! Binance API response types
//!
//! These types mirror the Binance spot API payloads and are converted
//! to pulse-core ticks for use in the application.

use std::str::FromStr;

use pulse_core::{AssetSpec, RawTick};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

/// Base URL for Binance spot REST API
pub const REST_API_BASE: &str = "https://api.binance.com";

/// Base URL for Binance combined market streams
pub const STREAM_API_BASE: &str = "wss://stream.binance.com:9443";

/// Quote asset all tracked pairs are priced in
pub const QUOTE_ASSET: &str = "USDT";

/// One entry from GET /api/v3/ticker/24hr
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: String,
    #[serde(default)]
    pub quote_volume: Option<String>,
}

/// Envelope of a combined stream frame
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    pub stream: String,
    pub data: TickerEvent,
}

/// `<symbol>@ticker` stream payload
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEvent {
    /// Event type, always "24hrTicker"
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "s")]
    pub symbol: String,
    /// Last price
    #[serde(rename = "c")]
    pub last_price: String,
    /// Total traded quote asset volume
    #[serde(rename = "q", default)]
    pub quote_volume: Option<String>,
}

/// Trading pair for a catalog symbol, e.g. BTC -> BTCUSDT
pub fn pair_for(symbol: &str) -> String {
    format!("{}{}", symbol.to_uppercase(), QUOTE_ASSET)
}

/// Find the catalog entry a Binance pair belongs to
pub fn spec_for_pair<'a>(pair: &str, assets: &'a [AssetSpec]) -> Option<&'a AssetSpec> {
    let base = pair.strip_suffix(QUOTE_ASSET)?;
    assets.iter().find(|a| a.symbol.eq_ignore_ascii_case(base))
}

/// Convert one pair quote into a tick, `None` when the record is unusable
pub fn to_raw_tick(
    pair: &str,
    last_price: &str,
    quote_volume: Option<&str>,
    assets: &[AssetSpec],
) -> Option<RawTick> {
    let Some(spec) = spec_for_pair(pair, assets) else {
        warn!("[Binance] Skipping untracked pair {}", pair);
        return None;
    };

    let price = match Decimal::from_str(last_price) {
        Ok(p) if p > Decimal::ZERO => p,
        _ => {
            warn!("[Binance] Skipping {} with invalid price {:?}", pair, last_price);
            return None;
        }
    };

    let volume = quote_volume
        .and_then(|v| Decimal::from_str(v).ok())
        .filter(|v| !v.is_sign_negative())
        .unwrap_or(Decimal::ZERO);

    Some(
        RawTick::new(spec.symbol.clone(), spec.name.clone(), spec.asset_type, price)
            .with_volume(volume),
    )
}

/// Normalize a 24hr ticker response, dropping malformed records
pub fn parse_tickers(records: Vec<serde_json::Value>, assets: &[AssetSpec]) -> Vec<RawTick> {
    records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Ticker24h>(value) {
            Ok(t) => to_raw_tick(&t.symbol, &t.last_price, t.quote_volume.as_deref(), assets),
            Err(e) => {
                warn!("[Binance] Skipping malformed ticker record: {}", e);
                None
            }
        })
        .collect()
}

/// Normalize one combined stream frame
pub fn parse_stream_frame(text: &str, assets: &[AssetSpec]) -> Option<RawTick> {
    match serde_json::from_str::<StreamEnvelope>(text) {
        Ok(frame) => to_raw_tick(
            &frame.data.symbol,
            &frame.data.last_price,
            frame.data.quote_volume.as_deref(),
            assets,
        ),
        Err(e) => {
            warn!("[Binance WS] Skipping malformed frame: {}", e);
            None
        }
    }
}
