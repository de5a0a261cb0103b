//! Alpha Vantage integration for Market Pulse
//!
//! REST-only stock quotes via the `GLOBAL_QUOTE` function.

pub mod client;
pub mod types;

pub use client::AlphaVantageClient;
