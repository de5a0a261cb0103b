//! Synthetic quote generator
//!
//! Random walk `next = price * (1 + (U - 0.5) * volatility)` with U uniform
//! on [0, 1). Prices are rounded to six decimal places and never drop below
//! [`PRICE_FLOOR`], whatever the volatility.

use std::collections::HashMap;

use pulse_core::{AssetSpec, RawTick, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

/// Smallest price the generator will emit (0.000001)
pub const PRICE_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Decimal places kept on generated prices
pub const PRICE_SCALE: u32 = 6;

/// Default per-step volatility (2%)
pub const DEFAULT_VOLATILITY: f64 = 0.02;

/// Apply one random-walk step for a draw `u` in [0, 1).
pub fn step(price: Decimal, volatility: f64, u: f64) -> Decimal {
    let factor = 1.0 + (u - 0.5) * volatility;
    let factor = Decimal::try_from(factor).unwrap_or(Decimal::ONE);

    price
        .checked_mul(factor)
        .unwrap_or(price)
        .round_dp(PRICE_SCALE)
        .max(PRICE_FLOOR)
}

/// One random-walk step using `rng`
pub fn next_price<R: Rng>(price: Decimal, volatility: f64, rng: &mut R) -> Decimal {
    step(price, volatility, rng.random::<f64>())
}

/// `n` chart points starting at `seed`
pub fn series<R: Rng>(
    seed: Decimal,
    n: usize,
    volatility: f64,
    rng: &mut R,
) -> Vec<Decimal> {
    let mut points = Vec::with_capacity(n);
    let mut price = seed.max(PRICE_FLOOR);
    for _ in 0..n {
        points.push(price);
        price = next_price(price, volatility, rng);
    }
    points
}

/// Stateful generator producing one tick per tracked asset per call
pub struct SyntheticGenerator {
    assets: Vec<AssetSpec>,
    prices: HashMap<String, Decimal>,
    volatility: f64,
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn new(assets: Vec<AssetSpec>, volatility: f64) -> Self {
        Self::with_rng(assets, volatility, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and reproducible demos
    pub fn with_seed(assets: Vec<AssetSpec>, volatility: f64, seed: u64) -> Self {
        Self::with_rng(assets, volatility, StdRng::seed_from_u64(seed))
    }

    fn with_rng(assets: Vec<AssetSpec>, volatility: f64, rng: StdRng) -> Self {
        let prices = assets
            .iter()
            .map(|a| (a.symbol.clone(), a.seed_price.max(PRICE_FLOOR)))
            .collect();

        Self {
            assets,
            prices,
            volatility: volatility.abs(),
            rng,
        }
    }

    /// Continue from the prices in `snapshot` where it has them
    pub fn resume_from(mut self, snapshot: &Snapshot) -> Self {
        for spec in &self.assets {
            let last = snapshot
                .assets(spec.asset_type)
                .iter()
                .find(|a| a.symbol == spec.symbol)
                .map(|a| a.price);
            if let Some(price) = last.filter(|p| *p > Decimal::ZERO) {
                self.prices.insert(spec.symbol.clone(), price);
            }
        }
        self
    }

    pub fn current_price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    /// Advance every asset one step
    pub fn tick(&mut self) -> Vec<RawTick> {
        let mut ticks = Vec::with_capacity(self.assets.len());

        for spec in &self.assets {
            let current = self
                .prices
                .get(&spec.symbol)
                .copied()
                .unwrap_or(spec.seed_price);
            let price = next_price(current, self.volatility, &mut self.rng);
            self.prices.insert(spec.symbol.clone(), price);

            let volume = step(spec.seed_volume, 0.2, self.rng.random::<f64>())
                .round_dp(0)
                .max(Decimal::ZERO);

            let market_cap = spec.seed_market_cap.and_then(|cap| {
                cap.checked_mul(price)
                    .and_then(|v| v.checked_div(spec.seed_price))
                    .map(|v| v.round_dp(0))
            });

            ticks.push(
                RawTick::new(spec.symbol.clone(), spec.name.clone(), spec.asset_type, price)
                    .with_volume(volume)
                    .with_market_cap(market_cap),
            );
        }

        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{default_crypto, default_stocks, Asset, AssetType};
    use rust_decimal_macros::dec;

    #[test]
    fn test_step_formula() {
        assert_eq!(step(dec!(100), 0.02, 0.5), dec!(100));
        assert_eq!(step(dec!(100), 0.02, 0.75), dec!(100.5));
        assert_eq!(step(dec!(100), 0.02, 0.0), dec!(99));
    }

    #[test]
    fn test_step_clamps_to_floor() {
        // factor 1 + (0 - 0.5) * 4 = -1
        assert_eq!(step(dec!(10), 4.0, 0.0), PRICE_FLOOR);
        assert_eq!(step(PRICE_FLOOR, 1.99, 0.0), PRICE_FLOOR);
        assert_eq!(step(dec!(5), f64::NAN, 0.3), dec!(5));
    }

    #[test]
    fn test_prices_stay_positive_over_long_walks() {
        for (i, volatility) in [0.0, 0.02, 0.5, 1.0, 2.0, 5.0].into_iter().enumerate() {
            let mut generator =
                SyntheticGenerator::with_seed(default_crypto(), volatility, i as u64);
            for _ in 0..10_000 {
                for tick in generator.tick() {
                    assert!(tick.price > Decimal::ZERO, "volatility={}", volatility);
                    assert!(tick.volume >= Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_seeded_generators_are_deterministic() {
        let mut a = SyntheticGenerator::with_seed(default_stocks(), 0.02, 7);
        let mut b = SyntheticGenerator::with_seed(default_stocks(), 0.02, 7);
        for _ in 0..20 {
            assert_eq!(a.tick(), b.tick());
        }
    }

    #[test]
    fn test_resume_from_snapshot_prices() {
        let tick = RawTick::new("BTC", "Bitcoin", AssetType::Crypto, dec!(70000));
        let snapshot = Snapshot {
            crypto_data: vec![Asset::from_tick(&tick, dec!(70000)).unwrap()],
            ..Snapshot::empty()
        };

        let generator =
            SyntheticGenerator::with_seed(default_crypto(), 0.02, 1).resume_from(&snapshot);

        assert_eq!(generator.current_price("BTC"), Some(dec!(70000)));
        assert_eq!(generator.current_price("ETH"), Some(dec!(3400)));
    }

    #[test]
    fn test_series_length_and_seed() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = series(dec!(150), 30, 0.05, &mut rng);

        assert_eq!(points.len(), 30);
        assert_eq!(points[0], dec!(150));
        assert!(points.iter().all(|p| *p > Decimal::ZERO));
        assert!(series(dec!(1), 0, 0.05, &mut rng).is_empty());
    }
}
