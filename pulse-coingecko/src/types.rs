//! CoinGecko API response types

use pulse_core::{AssetSpec, RawTick};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

/// Base URL for the public CoinGecko API
pub const API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Fiat currency quotes are requested in
pub const VS_CURRENCY: &str = "usd";

/// One entry from GET /coins/markets
#[derive(Debug, Clone, Deserialize)]
pub struct CoinMarket {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    #[serde(default)]
    pub total_volume: Option<Decimal>,
}

/// CoinGecko coin id for a ticker symbol
pub fn coin_id(symbol: &str) -> Option<&'static str> {
    let id = match symbol.to_uppercase().as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "SOL" => "solana",
        "BNB" => "binancecoin",
        "XRP" => "ripple",
        "ADA" => "cardano",
        "DOGE" => "dogecoin",
        "DOT" => "polkadot",
        "LTC" => "litecoin",
        "AVAX" => "avalanche-2",
        "LINK" => "chainlink",
        _ => return None,
    };
    Some(id)
}

/// Resolve the ids to request, falling back to the lowercased name
pub fn ids_for(assets: &[AssetSpec]) -> Vec<String> {
    assets
        .iter()
        .map(|a| {
            coin_id(&a.symbol)
                .map(str::to_string)
                .unwrap_or_else(|| a.name.to_lowercase().replace(' ', "-"))
        })
        .collect()
}

impl CoinMarket {
    fn to_raw_tick(&self, assets: &[AssetSpec]) -> Option<RawTick> {
        let Some(spec) = assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(&self.symbol))
        else {
            warn!("[CoinGecko] Skipping untracked coin {} ({})", self.id, self.symbol);
            return None;
        };

        let price = match self.current_price {
            Some(p) if p > Decimal::ZERO => p,
            other => {
                warn!("[CoinGecko] Skipping {} with invalid price {:?}", self.id, other);
                return None;
            }
        };

        let volume = self
            .total_volume
            .filter(|v| !v.is_sign_negative())
            .unwrap_or(Decimal::ZERO);

        Some(
            RawTick::new(spec.symbol.clone(), spec.name.clone(), spec.asset_type, price)
                .with_volume(volume)
                .with_market_cap(self.market_cap.filter(|c| *c > Decimal::ZERO)),
        )
    }
}

/// Normalize a markets response, dropping malformed records
pub fn parse_markets(records: Vec<serde_json::Value>, assets: &[AssetSpec]) -> Vec<RawTick> {
    records
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<CoinMarket>(value) {
            Ok(market) => market.to_raw_tick(assets),
            Err(e) => {
                warn!("[CoinGecko] Skipping malformed market record: {}", e);
                None
            }
        })
        .collect()
}
