//! Snapshot aggregation
//!
//! Pure merge of tick batches into a new [`Snapshot`]. Deltas are always
//! derived here from the previous snapshot; symbols without a tick are
//! carried forward untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pulse_core::{Asset, AssetType, RawTick, Snapshot};
use rust_decimal::Decimal;
use tracing::warn;

/// Merge stock and crypto ticks into `previous`, producing a new snapshot.
///
/// Ticks are applied in arrival order, so a symbol repeated within one
/// batch chains: the second tick's previous price is the first tick's price.
/// `is_loading` is copied from `previous`; the caller decides when loading ends.
pub fn merge(
    previous: &Snapshot,
    stock_ticks: &[RawTick],
    crypto_ticks: &[RawTick],
    timestamp: DateTime<Utc>,
) -> Snapshot {
    Snapshot {
        stocks_data: merge_class(&previous.stocks_data, stock_ticks, AssetType::Stock),
        crypto_data: merge_class(&previous.crypto_data, crypto_ticks, AssetType::Crypto),
        is_loading: previous.is_loading,
        timestamp,
    }
}

/// Merge one batch for a single asset class
pub fn merge_batch(
    previous: &Snapshot,
    asset_type: AssetType,
    ticks: &[RawTick],
    timestamp: DateTime<Utc>,
) -> Snapshot {
    match asset_type {
        AssetType::Stock => merge(previous, ticks, &[], timestamp),
        AssetType::Crypto => merge(previous, &[], ticks, timestamp),
    }
}

fn merge_class(previous: &[Asset], ticks: &[RawTick], asset_type: AssetType) -> Vec<Asset> {
    let mut book: BTreeMap<&str, Asset> = previous
        .iter()
        .map(|asset| (asset.symbol.as_str(), asset.clone()))
        .collect();

    for tick in ticks {
        if tick.asset_type != asset_type {
            warn!(
                "[Aggregator] Dropping {} tick for {} in the {} slot",
                tick.asset_type, tick.symbol, asset_type
            );
            continue;
        }
        if tick.price <= Decimal::ZERO {
            warn!(
                "[Aggregator] Dropping {} tick with non-positive price {}",
                tick.symbol, tick.price
            );
            continue;
        }

        let previous_price = book
            .get(tick.symbol.as_str())
            .map(|asset| asset.price)
            .unwrap_or(tick.price);
        match Asset::from_tick(tick, previous_price) {
            Some(asset) => {
                book.insert(tick.symbol.as_str(), asset);
            }
            None => warn!(
                "[Aggregator] Dropping {} tick, change from {} to {} overflows",
                tick.symbol, previous_price, tick.price
            ),
        }
    }

    book.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stock(symbol: &str, price: Decimal) -> RawTick {
        RawTick::new(symbol, format!("{} Corp", symbol), AssetType::Stock, price)
    }

    fn crypto(symbol: &str, price: Decimal) -> RawTick {
        RawTick::new(symbol, symbol, AssetType::Crypto, price)
    }

    fn snapshot_with(stocks: &[RawTick], crypto_ticks: &[RawTick]) -> Snapshot {
        merge(&Snapshot::empty(), stocks, crypto_ticks, Utc::now())
    }

    #[test]
    fn test_change_is_derived_from_previous_snapshot() {
        let prev = snapshot_with(&[stock("AAPL", dec!(100))], &[]);
        let next = merge(&prev, &[stock("AAPL", dec!(102))], &[], Utc::now());

        let aapl = &next.stocks_data[0];
        assert_eq!(aapl.previous_price, dec!(100));
        assert_eq!(aapl.change, dec!(2));
        assert_eq!(aapl.change_percent, dec!(2));
    }

    #[test]
    fn test_change_invariant_holds_for_every_asset() {
        let prev = snapshot_with(
            &[stock("AAPL", dec!(100)), stock("MSFT", dec!(3))],
            &[crypto("BTC", dec!(65000))],
        );
        let next = merge(
            &prev,
            &[stock("MSFT", dec!(4)), stock("NVDA", dec!(880))],
            &[crypto("BTC", dec!(64350.5))],
            Utc::now(),
        );

        for asset in next.stocks_data.iter().chain(next.crypto_data.iter()) {
            assert_eq!(asset.change, asset.price - asset.previous_price);
            if asset.previous_price.is_zero() {
                assert_eq!(asset.change_percent, Decimal::ZERO);
            } else {
                assert_eq!(
                    asset.change_percent,
                    asset.change / asset.previous_price * Decimal::ONE_HUNDRED
                );
            }
        }
    }

    #[test]
    fn test_new_symbol_uses_own_price_as_previous() {
        let next = snapshot_with(&[stock("TSLA", dec!(175.3))], &[]);
        let tsla = &next.stocks_data[0];

        assert_eq!(tsla.previous_price, dec!(175.3));
        assert_eq!(tsla.change, Decimal::ZERO);
        assert_eq!(tsla.change_percent, Decimal::ZERO);
    }

    #[test]
    fn test_absent_symbols_carry_forward() {
        let prev = snapshot_with(
            &[stock("AAPL", dec!(100)), stock("MSFT", dec!(400))],
            &[crypto("ETH", dec!(3400))],
        );
        let prev = merge(&prev, &[stock("MSFT", dec!(410))], &[], Utc::now());

        let next = merge(&prev, &[stock("AAPL", dec!(101))], &[], Utc::now());

        assert_eq!(next.stocks_data.len(), 2);
        assert_eq!(next.stocks_data[1], prev.stocks_data[1]);
        assert_eq!(next.crypto_data, prev.crypto_data);
    }

    #[test]
    fn test_empty_batch_carries_everything_forward() {
        let prev = snapshot_with(
            &[stock("AAPL", dec!(100)), stock("MSFT", dec!(400))],
            &[crypto("BTC", dec!(50000))],
        );
        let next = merge(&prev, &[], &[], Utc::now());

        assert_eq!(next.stocks_data, prev.stocks_data);
        assert_eq!(next.crypto_data, prev.crypto_data);
        assert_eq!(next.price_of("BTC"), Some(dec!(50000)));
    }

    #[test]
    fn test_output_sorted_by_symbol() {
        let next = snapshot_with(
            &[stock("TSLA", dec!(1)), stock("AAPL", dec!(1)), stock("MSFT", dec!(1))],
            &[crypto("SOL", dec!(1)), crypto("BTC", dec!(1))],
        );

        let symbols: Vec<&str> = next.stocks_data.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA"]);
        assert_eq!(next.crypto_data[0].symbol, "BTC");
    }

    #[test]
    fn test_duplicate_symbol_in_batch_chains() {
        let prev = snapshot_with(&[stock("AAPL", dec!(100))], &[]);
        let next = merge(
            &prev,
            &[stock("AAPL", dec!(101)), stock("AAPL", dec!(103))],
            &[],
            Utc::now(),
        );

        let aapl = &next.stocks_data[0];
        assert_eq!(aapl.price, dec!(103));
        assert_eq!(aapl.previous_price, dec!(101));
        assert_eq!(aapl.change, dec!(2));
    }

    #[test]
    fn test_invalid_ticks_are_dropped() {
        let prev = snapshot_with(&[stock("AAPL", dec!(100))], &[]);
        let next = merge(
            &prev,
            &[stock("AAPL", dec!(0)), crypto("BTC", dec!(65000))],
            &[],
            Utc::now(),
        );

        assert_eq!(next.stocks_data, prev.stocks_data);
        assert!(next.crypto_data.is_empty());
    }

    #[test]
    fn test_overflowing_change_drops_tick() {
        let prev = snapshot_with(&[], &[crypto("SHIB", dec!(0.000001))]);
        let huge = Decimal::from_i128_with_scale(10_000_000_000_000_000_000_000_000, 0);
        let next = merge(
            &prev,
            &[],
            &[crypto("SHIB", huge), crypto("BTC", dec!(65000))],
            Utc::now(),
        );

        assert_eq!(next.price_of("SHIB"), Some(dec!(0.000001)));
        assert_eq!(next.price_of("BTC"), Some(dec!(65000)));
    }

    #[test]
    fn test_merge_batch_routes_by_class() {
        let next = merge_batch(
            &Snapshot::empty(),
            AssetType::Crypto,
            &[crypto("ETH", dec!(3400))],
            Utc::now(),
        );

        assert!(next.stocks_data.is_empty());
        assert_eq!(next.crypto_data.len(), 1);
        assert!(next.is_loading);
    }
}
