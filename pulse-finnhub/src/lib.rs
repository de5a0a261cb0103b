//! Finnhub integration for Market Pulse
//!
//! This crate provides a REST quote client and a trade-stream WebSocket
//! subscriber for live stock prices.

pub mod client;
pub mod types;
pub mod websocket;

pub use client::FinnhubClient;
pub use websocket::FinnhubWebSocket;
