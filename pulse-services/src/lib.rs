//! Services for the Market Pulse data layer
//!
//! This crate turns provider feeds into a single live [`Snapshot`] of
//! stock and crypto quotes: transport supervision, synthetic data,
//! aggregation and the subscription hub the UI reads from.
//!
//! [`Snapshot`]: pulse_core::Snapshot

pub mod aggregator;
pub mod backoff;
pub mod feed;
pub mod hub;
pub mod settings;
pub mod synthetic;
pub mod transport;

pub use aggregator::{merge, merge_batch};
pub use backoff::Backoff;
pub use feed::{FeedRegistry, ProviderAdapter, ProviderRegistry, QuoteFeed, TickStream};
pub use hub::{HubEvent, Listener, ListenerId, MarketDataHub};
pub use settings::{ApiKeys, PulseSettings, TransportSettings};
pub use synthetic::SyntheticGenerator;
pub use transport::{
    ClassHealth, Generation, GenerationGate, TickBatch, TickSource, TransportHealth,
    TransportManager, TransportMetrics, TransportPlan,
};
