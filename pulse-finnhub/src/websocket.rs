//! Finnhub WebSocket client for real-time trades
//!
//! One `subscribe` frame is sent per tracked symbol right after the
//! handshake. Trade frames become tick batches; pings are dropped.

use futures_util::stream::{BoxStream, StreamExt};
use futures_util::SinkExt;
use pulse_core::{AssetSpec, PulseError, PulseResult, RawTick};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};
use url::Url;

use crate::types::{parse_stream_frame, SubscribeMessage, STREAM_API_BASE};

/// Finnhub trade stream subscriber
#[derive(Clone)]
pub struct FinnhubWebSocket {
    base_url: String,
    api_key: String,
    assets: Vec<AssetSpec>,
}

impl FinnhubWebSocket {
    pub fn new(api_key: impl Into<String>, assets: Vec<AssetSpec>) -> Self {
        Self {
            base_url: STREAM_API_BASE.to_string(),
            api_key: api_key.into(),
            assets,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn stream_url(&self) -> PulseResult<Url> {
        Url::parse_with_params(&self.base_url, &[("token", self.api_key.as_str())])
            .map_err(|e| PulseError::config(format!("Invalid Finnhub stream URL: {}", e)))
    }

    /// Connect and subscribe to every tracked symbol
    pub async fn subscribe(&self) -> PulseResult<BoxStream<'static, PulseResult<Vec<RawTick>>>> {
        if self.assets.is_empty() {
            return Err(PulseError::config("No stocks to subscribe to"));
        }

        let url = self.stream_url()?;
        info!("[Finnhub WS] Connecting to {}", self.base_url);

        let (mut ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| PulseError::network(format!("Finnhub stream connect failed: {}", e)))?;

        for spec in &self.assets {
            let json = serde_json::to_string(&SubscribeMessage::subscribe(&spec.symbol))
                .map_err(|e| PulseError::internal(format!("Failed to encode subscribe: {}", e)))?;
            ws_stream
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| PulseError::network(format!("Failed to subscribe {}: {}", spec.symbol, e)))?;
        }

        info!("[Finnhub WS] Subscribed to {} symbols", self.assets.len());

        let assets = self.assets.clone();
        let stream = ws_stream.filter_map(move |msg| {
            let item = match msg {
                Ok(Message::Text(text)) => parse_stream_frame(text.as_str(), &assets).transpose(),
                Ok(Message::Close(frame)) => {
                    debug!("[Finnhub WS] Close frame received: {:?}", frame);
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(PulseError::network(format!("Finnhub stream error: {}", e)))),
            };
            futures_util::future::ready(item)
        });

        Ok(stream.boxed())
    }
}
