//! Finnhub API response types

use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Base URL for Finnhub REST API
pub const REST_API_BASE: &str = "https://finnhub.io/api/v1";

/// Finnhub WebSocket endpoint
pub const STREAM_API_BASE: &str = "wss://ws.finnhub.io";

/// Response from GET /quote
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    /// Current price, 0 for unknown symbols
    #[serde(rename = "c", default)]
    pub current: Option<Decimal>,
}

impl QuoteResponse {
    pub fn into_tick(self, spec: &AssetSpec) -> Option<RawTick> {
        match self.current {
            Some(price) if price > Decimal::ZERO => Some(RawTick::new(
                spec.symbol.clone(),
                spec.name.clone(),
                spec.asset_type,
                price,
            )),
            other => {
                warn!("[Finnhub] Skipping {} with invalid price {:?}", spec.symbol, other);
                None
            }
        }
    }
}

/// Outbound subscription frame
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMessage<'a> {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub symbol: &'a str,
}

impl<'a> SubscribeMessage<'a> {
    pub fn subscribe(symbol: &'a str) -> Self {
        Self {
            msg_type: "subscribe",
            symbol,
        }
    }
}

/// Inbound stream frame
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Trade {
        #[serde(default)]
        data: Vec<serde_json::Value>,
    },
    Ping,
    Error {
        #[serde(default)]
        msg: Option<String>,
    },
}

/// One trade inside a `trade` frame
#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "v", default)]
    pub volume: Option<Decimal>,
}

/// Normalize a stream frame into a batch.
///
/// Trades in one frame collapse to the last price per symbol with their
/// volumes summed. `Ok(None)` means the frame carried no quotes.
pub fn parse_stream_frame(text: &str, assets: &[AssetSpec]) -> PulseResult<Option<Vec<RawTick>>> {
    let frame = match serde_json::from_str::<StreamFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("[Finnhub WS] Skipping malformed frame: {}", e);
            return Ok(None);
        }
    };

    let data = match frame {
        StreamFrame::Trade { data } => data,
        StreamFrame::Ping => {
            debug!("[Finnhub WS] ping");
            return Ok(None);
        }
        StreamFrame::Error { msg } => {
            return Err(PulseError::api(format!(
                "Finnhub stream error: {}",
                msg.unwrap_or_else(|| "unknown".to_string())
            )));
        }
    };

    let mut ticks: Vec<RawTick> = Vec::new();
    for value in data {
        let trade = match serde_json::from_value::<Trade>(value) {
            Ok(t) if t.price > Decimal::ZERO => t,
            Ok(t) => {
                warn!("[Finnhub WS] Skipping {} trade with price {}", t.symbol, t.price);
                continue;
            }
            Err(e) => {
                warn!("[Finnhub WS] Skipping malformed trade: {}", e);
                continue;
            }
        };

        let Some(spec) = assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(&trade.symbol))
        else {
            warn!("[Finnhub WS] Skipping untracked symbol {}", trade.symbol);
            continue;
        };

        let volume = trade
            .volume
            .filter(|v| !v.is_sign_negative())
            .unwrap_or(Decimal::ZERO);

        match ticks.iter_mut().find(|t| t.symbol == spec.symbol) {
            Some(existing) => {
                existing.price = trade.price;
                existing.volume += volume;
            }
            None => ticks.push(
                RawTick::new(spec.symbol.clone(), spec.name.clone(), spec.asset_type, trade.price)
                    .with_volume(volume),
            ),
        }
    }

    Ok((!ticks.is_empty()).then_some(ticks))
}
