//! The tracked asset universe and its seed values

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AssetType;

/// Static description of one tracked asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    /// Starting point for synthetic prices
    pub seed_price: Decimal,
    pub seed_volume: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_market_cap: Option<Decimal>,
}

impl AssetSpec {
    fn new(
        symbol: &str,
        name: &str,
        asset_type: AssetType,
        seed_price: Decimal,
        seed_volume: Decimal,
        seed_market_cap: Option<Decimal>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            asset_type,
            seed_price,
            seed_volume,
            seed_market_cap,
        }
    }
}

/// Tracked stocks and crypto assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub stocks: Vec<AssetSpec>,
    pub crypto: Vec<AssetSpec>,
}

impl Catalog {
    pub fn new(stocks: Vec<AssetSpec>, crypto: Vec<AssetSpec>) -> Self {
        Self { stocks, crypto }
    }

    pub fn assets(&self, asset_type: AssetType) -> &[AssetSpec] {
        match asset_type {
            AssetType::Stock => &self.stocks,
            AssetType::Crypto => &self.crypto,
        }
    }

    pub fn find(&self, symbol: &str) -> Option<&AssetSpec> {
        self.stocks
            .iter()
            .chain(self.crypto.iter())
            .find(|spec| spec.symbol.eq_ignore_ascii_case(symbol))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_stocks(), default_crypto())
    }
}

fn d(mantissa: i64, scale: u32) -> Decimal {
    Decimal::new(mantissa, scale)
}

/// Default stock watch universe
pub fn default_stocks() -> Vec<AssetSpec> {
    let stock = |symbol, name, price, volume, cap| {
        AssetSpec::new(symbol, name, AssetType::Stock, price, volume, Some(cap))
    };

    vec![
        stock("AAPL", "Apple Inc.", d(18950, 2), d(54_000_000, 0), d(2_930_000_000_000, 0)),
        stock("AMZN", "Amazon.com Inc.", d(17820, 2), d(38_000_000, 0), d(1_850_000_000_000, 0)),
        stock("GOOGL", "Alphabet Inc.", d(15240, 2), d(26_000_000, 0), d(1_890_000_000_000, 0)),
        stock("JPM", "JPMorgan Chase & Co.", d(19510, 2), d(9_000_000, 0), d(560_000_000_000, 0)),
        stock("META", "Meta Platforms Inc.", d(50030, 2), d(15_000_000, 0), d(1_270_000_000_000, 0)),
        stock("MSFT", "Microsoft Corporation", d(41520, 2), d(21_000_000, 0), d(3_080_000_000_000, 0)),
        stock("NVDA", "NVIDIA Corporation", d(88010, 2), d(45_000_000, 0), d(2_200_000_000_000, 0)),
        stock("TSLA", "Tesla Inc.", d(17530, 2), d(92_000_000, 0), d(558_000_000_000, 0)),
    ]
}

/// Default crypto watch universe
pub fn default_crypto() -> Vec<AssetSpec> {
    let coin = |symbol, name, price, volume, cap| {
        AssetSpec::new(symbol, name, AssetType::Crypto, price, volume, Some(cap))
    };

    vec![
        coin("ADA", "Cardano", d(45, 2), d(420_000_000, 0), d(16_000_000_000, 0)),
        coin("BNB", "BNB", d(58000, 2), d(1_700_000_000, 0), d(86_000_000_000, 0)),
        coin("BTC", "Bitcoin", d(6_500_000, 2), d(28_000_000_000, 0), d(1_280_000_000_000, 0)),
        coin("DOGE", "Dogecoin", d(16, 2), d(1_100_000_000, 0), d(23_000_000_000, 0)),
        coin("ETH", "Ethereum", d(340_000, 2), d(14_000_000_000, 0), d(408_000_000_000, 0)),
        coin("SOL", "Solana", d(15000, 2), d(2_600_000_000, 0), d(67_000_000_000, 0)),
        coin("XRP", "XRP", d(52, 2), d(1_300_000_000, 0), d(28_000_000_000, 0)),
    ]
}
