//! Binance integration for Market Pulse
//!
//! This crate provides a REST client for 24hr ticker snapshots and a
//! combined-stream WebSocket subscriber for live crypto prices.

pub mod client;
pub mod types;
pub mod websocket;

pub use client::BinanceClient;
pub use websocket::BinanceWebSocket;
