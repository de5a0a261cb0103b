//! Core types for the Market Pulse data layer
//!
//! This crate defines the shared data structures used across the workspace,
//! including the canonical asset record, snapshots, provider configuration,
//! connection status and the UI push protocol.

pub mod asset;
pub mod catalog;
pub mod config;
pub mod error;
pub mod status;
pub mod websocket;

pub use asset::{Asset, AssetType, RawTick, Snapshot};
pub use catalog::{default_crypto, default_stocks, AssetSpec, Catalog};
pub use config::{ApiProvider, ConnectionMethod, Configuration};
pub use error::{PulseError, PulseResult};
pub use status::{ConnectionState, ConnectionStatus};
pub use websocket::{ClientMessage, ErrorCode, ServerMessage};
