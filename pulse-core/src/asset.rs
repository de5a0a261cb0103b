//! Canonical asset records and dashboard snapshots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset class of a quoted instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Stock,
    Crypto,
}

impl AssetType {
    pub const ALL: [AssetType; 2] = [AssetType::Stock, AssetType::Crypto];

    pub fn label(&self) -> &'static str {
        match self {
            AssetType::Stock => "stocks",
            AssetType::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single normalized quote as emitted by a provider adapter or the
/// synthetic generator. Carries no delta fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    pub price: Decimal,
    pub volume: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,
}

impl RawTick {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        asset_type: AssetType,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            asset_type,
            price,
            volume: Decimal::ZERO,
            market_cap: None,
        }
    }

    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_market_cap(mut self, market_cap: Option<Decimal>) -> Self {
        self.market_cap = market_cap;
        self
    }
}

/// Canonical asset record rendered by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub price: Decimal,
    pub previous_price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub volume: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,
}

impl Asset {
    /// Build an asset from a tick, deriving the deltas against `previous_price`.
    ///
    /// `None` when the deltas do not fit in a `Decimal`.
    pub fn from_tick(tick: &RawTick, previous_price: Decimal) -> Option<Self> {
        let change = tick.price.checked_sub(previous_price)?;
        let change_percent = if previous_price.is_zero() {
            Decimal::ZERO
        } else {
            change
                .checked_div(previous_price)?
                .checked_mul(Decimal::ONE_HUNDRED)?
        };

        Some(Self {
            symbol: tick.symbol.clone(),
            name: tick.name.clone(),
            asset_type: tick.asset_type,
            price: tick.price,
            previous_price,
            change,
            change_percent,
            volume: tick.volume,
            market_cap: tick.market_cap,
        })
    }
}

/// Immutable view of every tracked asset at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub stocks_data: Vec<Asset>,
    pub crypto_data: Vec<Asset>,
    pub is_loading: bool,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// The snapshot published before any data has arrived
    pub fn empty() -> Self {
        Self {
            stocks_data: Vec::new(),
            crypto_data: Vec::new(),
            is_loading: true,
            timestamp: Utc::now(),
        }
    }

    pub fn assets(&self, asset_type: AssetType) -> &[Asset] {
        match asset_type {
            AssetType::Stock => &self.stocks_data,
            AssetType::Crypto => &self.crypto_data,
        }
    }

    /// Look up a symbol in either asset class (case-insensitive)
    pub fn find(&self, symbol: &str) -> Option<&Asset> {
        self.stocks_data
            .iter()
            .chain(self.crypto_data.iter())
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn price_of(&self, symbol: &str) -> Option<Decimal> {
        self.find(symbol).map(|a| a.price)
    }

    pub fn with_loading(&self, is_loading: bool) -> Self {
        Self {
            is_loading,
            ..self.clone()
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_tick_derives_deltas() {
        let tick = RawTick::new("AAPL", "Apple Inc.", AssetType::Stock, dec!(102));
        let asset = Asset::from_tick(&tick, dec!(100)).unwrap();

        assert_eq!(asset.change, dec!(2));
        assert_eq!(asset.change_percent, dec!(2));
        assert_eq!(asset.previous_price, dec!(100));
    }

    #[test]
    fn test_unrepresentable_percent_is_none() {
        let tick = RawTick::new("SHIB", "Shiba Inu", AssetType::Crypto, Decimal::MAX);
        assert!(Asset::from_tick(&tick, dec!(0.000001)).is_none());
    }

    #[test]
    fn test_zero_previous_price_has_zero_percent() {
        let tick = RawTick::new("XRP", "XRP", AssetType::Crypto, dec!(0.5));
        let asset = Asset::from_tick(&tick, Decimal::ZERO).unwrap();

        assert_eq!(asset.change, dec!(0.5));
        assert_eq!(asset.change_percent, Decimal::ZERO);
    }

    #[test]
    fn test_asset_serializes_in_dashboard_shape() {
        let tick = RawTick::new("BTC", "Bitcoin", AssetType::Crypto, dec!(65000));
        let asset = Asset::from_tick(&tick, dec!(65000)).unwrap();
        let json = serde_json::to_value(&asset).unwrap();

        assert_eq!(json["type"], "CRYPTO");
        assert!(json.get("previousPrice").is_some());
        assert!(json.get("changePercent").is_some());
        assert!(json.get("marketCap").is_none());
    }

    #[test]
    fn test_snapshot_find_is_case_insensitive() {
        let tick = RawTick::new("ETH", "Ethereum", AssetType::Crypto, dec!(3400));
        let snapshot = Snapshot {
            crypto_data: vec![Asset::from_tick(&tick, dec!(3400)).unwrap()],
            ..Snapshot::empty()
        };

        assert_eq!(snapshot.price_of("eth"), Some(dec!(3400)));
        assert!(snapshot.find("SOL").is_none());
    }
}
