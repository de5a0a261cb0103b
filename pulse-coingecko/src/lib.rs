//! CoinGecko integration for Market Pulse
//!
//! REST-only: CoinGecko has no public streaming API, so this provider
//! can only be polled.

pub mod client;
pub mod types;

pub use client::CoinGeckoClient;
