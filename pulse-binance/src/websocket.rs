//! Binance WebSocket client for real-time tickers
//!
//! Subscribes to the combined `<pair>@ticker` stream for every tracked
//! pair. Each frame carries one pair and becomes a single-tick batch.

use futures_util::stream::{BoxStream, StreamExt};
use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};
use url::Url;

use crate::types::{pair_for, parse_stream_frame, STREAM_API_BASE};

/// Binance combined-stream subscriber
#[derive(Clone, Debug)]
pub struct BinanceWebSocket {
    base_url: String,
    assets: Vec<AssetSpec>,
}

impl BinanceWebSocket {
    pub fn new(assets: Vec<AssetSpec>) -> Self {
        Self {
            base_url: STREAM_API_BASE.to_string(),
            assets,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Combined stream URL, e.g. `/stream?streams=btcusdt@ticker/ethusdt@ticker`
    pub fn stream_url(&self) -> PulseResult<Url> {
        let streams = self
            .assets
            .iter()
            .map(|a| format!("{}@ticker", pair_for(&a.symbol).to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");

        Url::parse(&format!("{}/stream?streams={}", self.base_url, streams))
            .map_err(|e| PulseError::config(format!("Invalid Binance stream URL: {}", e)))
    }

    /// Open the stream. Returns once the handshake completes; dropping the
    /// returned stream closes the connection.
    pub async fn subscribe(&self) -> PulseResult<BoxStream<'static, PulseResult<Vec<RawTick>>>> {
        if self.assets.is_empty() {
            return Err(PulseError::config("No crypto assets to subscribe to"));
        }

        let url = self.stream_url()?;
        info!("[Binance WS] Connecting to {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| PulseError::network(format!("Binance stream connect failed: {}", e)))?;

        info!("[Binance WS] Connected, {} streams", self.assets.len());

        let assets = self.assets.clone();
        let stream = ws_stream.filter_map(move |msg| {
            let item = match msg {
                Ok(Message::Text(text)) => {
                    parse_stream_frame(text.as_str(), &assets).map(|tick| Ok(vec![tick]))
                }
                Ok(Message::Close(frame)) => {
                    debug!("[Binance WS] Close frame received: {:?}", frame);
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(PulseError::network(format!("Binance stream error: {}", e)))),
            };
            futures_util::future::ready(item)
        });

        Ok(stream.boxed())
    }
}
